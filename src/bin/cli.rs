//! blockindex CLI
//!
//! Batch driver: reads a command count followed by that many commands from
//! stdin and runs them against an ordered index of `(key, value)` entries.
//!
//! ```text
//! 4
//! insert apple 3
//! insert apple 1
//! find apple        → 1 3
//! delete apple 1
//! ```
//! `find` prints every value stored under the key in ascending order, or
//! `null` if there is none.

use std::error::Error;
use std::io::{self, BufWriter, Read, Write};

use blockindex::{Config, FixedBytes, OrderedIndex, Storage};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// Longest key accepted, in bytes
const KEY_LEN: usize = 64;

/// Entries per block
const BLOCK_CAPACITY: usize = 161;

type Key = FixedBytes<KEY_LEN>;
type Index = OrderedIndex<(Key, i32), Box<dyn Storage>, BLOCK_CAPACITY>;

/// blockindex CLI
#[derive(Parser, Debug)]
#[command(name = "blockindex-cli")]
#[command(about = "Run insert/delete/find commands from stdin against a block index")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./blockindex_data")]
    data_dir: String,

    /// Index name (file is {data_dir}/{name}.idx)
    #[arg(short, long, default_value = "list")]
    name: String,

    /// Keep the index in memory instead of on disk
    #[arg(long)]
    in_memory: bool,

    /// Run an integrity check after the last command
    #[arg(long)]
    verify: bool,
}

fn main() {
    // Logs go to stderr; stdout carries command output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,blockindex=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let mut builder = Config::builder().data_dir(&args.data_dir);
    if args.in_memory {
        builder = builder.in_memory();
    }
    let config = builder.build();

    tracing::info!(data_dir = %args.data_dir, name = %args.name, in_memory = args.in_memory, "opening index");
    let storage = config.open_storage(&format!("{}.idx", args.name))?;
    let mut index = Index::open(storage)?;

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let mut tokens = input.split_whitespace();

    let count: usize = next_token(&mut tokens, "command count")?.parse()?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for _ in 0..count {
        match next_token(&mut tokens, "command")? {
            "insert" => {
                let entry = read_entry(&mut tokens)?;
                index.insert(entry)?;
            }
            "delete" => {
                let entry = read_entry(&mut tokens)?;
                index.erase(&entry)?;
            }
            "find" => {
                let key = Key::try_from(next_token(&mut tokens, "key")?)?;
                let found = index.find(&(key, i32::MIN), &(key, i32::MAX))?;
                if found.is_empty() {
                    writeln!(out, "null")?;
                } else {
                    let values: Vec<String> = found.iter().map(|(_, value)| value.to_string()).collect();
                    writeln!(out, "{}", values.join(" "))?;
                }
            }
            other => return Err(format!("unknown command: {}", other).into()),
        }
    }
    out.flush()?;

    if args.verify {
        let stats = index.verify()?;
        tracing::info!(
            entries = stats.entries,
            leaf_blocks = stats.leaf_blocks,
            head_blocks = stats.head_blocks,
            "index verified"
        );
    }

    index.sync()?;
    Ok(())
}

fn next_token<'a>(tokens: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<&'a str, Box<dyn Error>> {
    tokens
        .next()
        .ok_or_else(|| format!("unexpected end of input, expected {}", what).into())
}

fn read_entry<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<(Key, i32), Box<dyn Error>> {
    let key = Key::try_from(next_token(tokens, "key")?)?;
    let value: i32 = next_token(tokens, "value")?.parse()?;
    Ok((key, value))
}
