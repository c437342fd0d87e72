//! Ledger primitives for building Cardano-style transactions: hashes,
//! addresses, the `Value` arithmetic engine, transaction records and their
//! canonical CBOR encodings, and protocol parameters.
//!
//! Everything here is deterministic and side-effect free; the builder crate
//! (`tessera-transactions`) layers fee estimation and balancing on top.

pub mod address;
pub mod codec;
pub mod hash;
pub mod params;
pub mod transaction;
pub mod value;

pub use address::Address;
pub use codec::CanonicalCbor;
pub use hash::{blake2b_224, blake2b_256, AddrKeyhash, DatumHash, Hash, PolicyId, ScriptHash, TransactionId};
pub use params::{ExUnitPrices, ProtocolParameters, RationalNumber, ReferenceScriptFeeSchedule};
pub use transaction::{
    AuxiliaryData, Certificate, Datum, ExUnits, Metadatum, NetworkId, PlutusData, Redeemer,
    RedeemerTag, Script, ScriptLanguage, Transaction, TransactionBody, TransactionInput,
    TransactionOutput, UnspentOutput, WitnessSet,
};
pub use value::{AssetName, Mint, Value};
