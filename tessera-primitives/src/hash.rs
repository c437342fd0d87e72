//! Fixed-width hashes and the Blake2b digests the ledger uses.

use std::fmt;
use std::str::FromStr;

use blake2::digest::consts::{U28, U32};
use blake2::{Blake2b, Digest};
use thiserror::Error;

use crate::codec::{CanonicalCbor, Enc, EncodeError};

/// A fixed-width hash, stored as raw bytes and rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash<const N: usize>([u8; N]);

pub type TransactionId = Hash<32>;
pub type DatumHash = Hash<32>;
pub type PolicyId = Hash<28>;
pub type ScriptHash = Hash<28>;
pub type AddrKeyhash = Hash<28>;

impl<const N: usize> Hash<N> {
    pub const fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> From<[u8; N]> for Hash<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> AsRef<[u8]> for Hash<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> fmt::Display for Hash<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl<const N: usize> fmt::Debug for Hash<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash<{}>({})", N, hex::encode(self.0))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum HashParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

impl<const N: usize> FromStr for Hash<N> {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let bytes: [u8; N] = bytes.try_into().map_err(|v: Vec<u8>| HashParseError::Length {
            expected: N,
            actual: v.len(),
        })?;
        Ok(Self(bytes))
    }
}

impl<const N: usize> CanonicalCbor for Hash<N> {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        e.bytes(&self.0)?;
        Ok(())
    }
}

pub fn blake2b_256(bytes: &[u8]) -> Hash<32> {
    Hash(Blake2b::<U32>::digest(bytes).into())
}

pub fn blake2b_224(bytes: &[u8]) -> Hash<28> {
    Hash(Blake2b::<U28>::digest(bytes).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let id: TransactionId =
            "0000000000000000000000000000000000000000000000000000000000000001"
                .parse()
                .unwrap();
        assert_eq!(id.as_bytes()[31], 1);
        assert_eq!(
            id.to_string(),
            "0000000000000000000000000000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = "00ff".parse::<Hash<28>>().unwrap_err();
        assert_eq!(
            err,
            HashParseError::Length {
                expected: 28,
                actual: 2
            }
        );
    }

    #[test]
    fn bad_hex_is_rejected() {
        let err = "zz".repeat(32).parse::<TransactionId>().unwrap_err();
        let again = "zz".repeat(32).parse::<TransactionId>().unwrap_err();
        assert!(matches!(err, HashParseError::Hex(_)));
        assert_eq!(err, again);
    }

    #[test]
    fn blake2b_256_empty_input() {
        // Blake2b-256 of the empty string, a published vector.
        assert_eq!(
            blake2b_256(b"").to_string(),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
    }

    #[test]
    fn digest_widths() {
        assert_eq!(blake2b_256(b"x").as_bytes().len(), 32);
        assert_eq!(blake2b_224(b"x").as_bytes().len(), 28);
    }
}
