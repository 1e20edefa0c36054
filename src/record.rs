//! Record codec
//!
//! Fixed-width, little-endian encoding for everything stored inside a block.
//! Blocks never change size on disk, so every entry type must encode to
//! exactly `ENCODED_LEN` bytes.

use std::fmt;

use bytes::{Buf, BufMut};

use crate::error::{IndexError, Result};

/// An entry that can live in a block
///
/// Ordering comes from `Ord`. Two entries are the same entry when neither
/// is less than the other.
pub trait Record: Ord + Clone + fmt::Debug {
    /// Exact number of bytes `encode` writes and `decode` consumes
    const ENCODED_LEN: usize;

    fn encode<B: BufMut>(&self, buf: &mut B);

    fn decode<B: Buf>(buf: &mut B) -> Self;
}

macro_rules! impl_record_for_int {
    ($ty:ty, $put:ident, $get:ident) => {
        impl Record for $ty {
            const ENCODED_LEN: usize = std::mem::size_of::<$ty>();

            fn encode<B: BufMut>(&self, buf: &mut B) {
                buf.$put(*self);
            }

            fn decode<B: Buf>(buf: &mut B) -> Self {
                buf.$get()
            }
        }
    };
}

impl_record_for_int!(u16, put_u16_le, get_u16_le);
impl_record_for_int!(u32, put_u32_le, get_u32_le);
impl_record_for_int!(u64, put_u64_le, get_u64_le);
impl_record_for_int!(i32, put_i32_le, get_i32_le);
impl_record_for_int!(i64, put_i64_le, get_i64_le);

/// Key plus disambiguator, ordered lexicographically
impl<A: Record, B2: Record> Record for (A, B2) {
    const ENCODED_LEN: usize = A::ENCODED_LEN + B2::ENCODED_LEN;

    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.0.encode(buf);
        self.1.encode(buf);
    }

    fn decode<B: Buf>(buf: &mut B) -> Self {
        let first = A::decode(buf);
        let second = B2::decode(buf);
        (first, second)
    }
}

// =============================================================================
// Fixed-width byte strings
// =============================================================================

/// A byte string of at most `N` bytes, zero-padded to exactly `N`
///
/// Compares like C `strcmp` on the unpadded contents: a proper prefix
/// sorts before any longer string that extends it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedBytes<const N: usize>([u8; N]);

impl<const N: usize> FixedBytes<N> {
    /// Build from raw bytes, failing if they don't fit
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > N {
            return Err(IndexError::KeyTooLong {
                len: bytes.len(),
                max: N,
            });
        }
        let mut data = [0u8; N];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(data))
    }

    /// The unpadded contents (up to the first zero byte)
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(N);
        &self.0[..len]
    }

    /// Smallest value: the empty string
    pub fn min_value() -> Self {
        Self([0u8; N])
    }

    /// Largest value: all bytes 0xFF
    pub fn max_value() -> Self {
        Self([u8::MAX; N])
    }
}

impl<const N: usize> TryFrom<&str> for FixedBytes<N> {
    type Error = IndexError;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s.as_bytes())
    }
}

impl<const N: usize> fmt::Display for FixedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl<const N: usize> fmt::Debug for FixedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedBytes({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl<const N: usize> Record for FixedBytes<N> {
    const ENCODED_LEN: usize = N;

    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.0);
    }

    fn decode<B: Buf>(buf: &mut B) -> Self {
        let mut data = [0u8; N];
        buf.copy_to_slice(&mut data);
        Self(data)
    }
}
