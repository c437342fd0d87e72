//! Canonical CBOR support.
//!
//! All wire encodings in this workspace are deterministic: definite-length
//! containers only, minimal-width integer heads (minicbor already emits
//! these), and map keys written in ascending encoded order by the caller.
//! Types implement [`CanonicalCbor`] by hand instead of deriving, so the
//! byte layout is explicit and stable.

use std::convert::Infallible;

use minicbor::{Decoder, Encoder};
use thiserror::Error;

/// Encoder specialization used everywhere: writing into a `Vec<u8>` cannot
/// fail, so encode methods never surface I/O errors.
pub type Enc<'a> = Encoder<&'a mut Vec<u8>>;

pub type EncodeError = minicbor::encode::Error<Infallible>;

/// Deterministic CBOR encoding of a ledger type.
pub trait CanonicalCbor {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError>;

    fn to_cbor(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut e = Encoder::new(&mut buf);
        self.encode_cbor(&mut e)
            .unwrap_or_else(|_| unreachable!("vec writes are infallible"));
        buf
    }

    /// Serialized size in bytes. Sizing a candidate is how fee estimation
    /// works, so this is called on every balancing pass.
    fn cbor_len(&self) -> usize {
        self.to_cbor().len()
    }
}

/// Appends pre-encoded CBOR verbatim, without re-interpreting it.
pub fn raw(e: &mut Enc<'_>, bytes: &[u8]) -> Result<(), EncodeError> {
    e.writer_mut().extend_from_slice(bytes);
    Ok(())
}

#[derive(Debug, Error)]
#[error("malformed script container: {0}")]
pub struct ScriptSizeError(#[from] minicbor::decode::Error);

/// Byte length of the script payload inside an encoded `[language, bytes]`
/// container. The script itself is never interpreted; only the container
/// head and the byte-string head are decoded.
pub fn script_payload_len(container: &[u8]) -> Result<usize, ScriptSizeError> {
    let mut d = Decoder::new(container);
    d.array()?;
    d.u8()?;
    Ok(d.bytes()?.len())
}
