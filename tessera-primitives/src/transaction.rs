//! Transaction records and their canonical wire encodings.
//!
//! The layout is the ledger's map-keyed body format: optional fields are
//! simply absent, map keys are written in ascending order, and every
//! container is definite-length. Serializing the same logical transaction
//! therefore always yields the same bytes, which both the transaction id and
//! the fee fixed point depend on.

use std::fmt;

use crate::address::Address;
use crate::codec::{raw, CanonicalCbor, Enc, EncodeError};
use crate::hash::{blake2b_256, AddrKeyhash, DatumHash, Hash, TransactionId};
use crate::value::{Mint, Value};

use minicbor::data::Tag;
use std::collections::BTreeMap;

/// A reference to an output of a previous transaction.
///
/// `Ord` is (transaction id, index) — the canonical order for input sets.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionInput {
    pub transaction_id: TransactionId,
    pub index: u64,
}

impl TransactionInput {
    pub fn new(transaction_id: TransactionId, index: u64) -> Self {
        Self {
            transaction_id,
            index,
        }
    }
}

impl fmt::Display for TransactionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.transaction_id, self.index)
    }
}

impl fmt::Debug for TransactionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionInput({self})")
    }
}

impl CanonicalCbor for TransactionInput {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        e.array(2)?;
        self.transaction_id.encode_cbor(e)?;
        e.u64(self.index)?;
        Ok(())
    }
}

/// Opaque Plutus data, carried as its own already-encoded CBOR and written
/// through verbatim so third-party data never gets re-normalized.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PlutusData(Vec<u8>);

impl PlutusData {
    pub fn new(cbor: Vec<u8>) -> Self {
        Self(cbor)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(s)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PlutusData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlutusData({})", hex::encode(&self.0))
    }
}

impl CanonicalCbor for PlutusData {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        raw(e, &self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Datum {
    Hash(DatumHash),
    Inline(PlutusData),
}

impl CanonicalCbor for Datum {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        e.array(2)?;
        match self {
            Datum::Hash(h) => {
                e.u8(0)?;
                h.encode_cbor(e)?;
            }
            Datum::Inline(data) => {
                e.u8(1)?;
                e.tag(Tag::Cbor)?;
                e.bytes(data.as_bytes())?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScriptLanguage {
    Native,
    PlutusV1,
    PlutusV2,
    PlutusV3,
}

impl ScriptLanguage {
    pub fn wire(self) -> u8 {
        match self {
            ScriptLanguage::Native => 0,
            ScriptLanguage::PlutusV1 => 1,
            ScriptLanguage::PlutusV2 => 2,
            ScriptLanguage::PlutusV3 => 3,
        }
    }
}

/// A script with its language tag. Encoded as the `[language, bytes]`
/// container; the payload itself is never interpreted here.
#[derive(Clone, PartialEq, Eq)]
pub struct Script {
    pub language: ScriptLanguage,
    payload: Vec<u8>,
}

impl Script {
    pub fn new(language: ScriptLanguage, payload: Vec<u8>) -> Self {
        Self { language, payload }
    }

    pub fn plutus_v2(payload: Vec<u8>) -> Self {
        Self::new(ScriptLanguage::PlutusV2, payload)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({:?}, {} bytes)", self.language, self.payload.len())
    }
}

impl CanonicalCbor for Script {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        e.array(2)?;
        e.u8(self.language.wire())?;
        e.bytes(&self.payload)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionOutput {
    pub address: Address,
    pub value: Value,
    pub datum: Option<Datum>,
    pub script_ref: Option<Script>,
}

impl TransactionOutput {
    pub fn new(address: Address, value: Value) -> Self {
        Self {
            address,
            value,
            datum: None,
            script_ref: None,
        }
    }

    pub fn with_datum(mut self, datum: Datum) -> Self {
        self.datum = Some(datum);
        self
    }

    pub fn with_script_ref(mut self, script: Script) -> Self {
        self.script_ref = Some(script);
        self
    }
}

impl CanonicalCbor for TransactionOutput {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        let len = 2 + self.datum.is_some() as u64 + self.script_ref.is_some() as u64;
        e.map(len)?;
        e.u8(0)?;
        self.address.encode_cbor(e)?;
        e.u8(1)?;
        self.value.encode_cbor(e)?;
        if let Some(datum) = &self.datum {
            e.u8(2)?;
            datum.encode_cbor(e)?;
        }
        if let Some(script) = &self.script_ref {
            e.u8(3)?;
            e.tag(Tag::Cbor)?;
            e.bytes(&script.to_cbor())?;
        }
        Ok(())
    }
}

/// An output together with the input that points at it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnspentOutput {
    pub input: TransactionInput,
    pub output: TransactionOutput,
}

impl UnspentOutput {
    pub fn new(input: TransactionInput, output: TransactionOutput) -> Self {
        Self { input, output }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ExUnits {
    pub mem: u64,
    pub steps: u64,
}

impl ExUnits {
    pub fn new(mem: u64, steps: u64) -> Self {
        Self { mem, steps }
    }

    pub fn is_zero(&self) -> bool {
        self.mem == 0 && self.steps == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RedeemerTag {
    Spend,
    Mint,
    Cert,
    Reward,
}

impl RedeemerTag {
    pub fn wire(self) -> u8 {
        match self {
            RedeemerTag::Spend => 0,
            RedeemerTag::Mint => 1,
            RedeemerTag::Cert => 2,
            RedeemerTag::Reward => 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redeemer {
    pub tag: RedeemerTag,
    pub index: u64,
    pub data: PlutusData,
    pub ex_units: ExUnits,
}

impl CanonicalCbor for Redeemer {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        e.array(4)?;
        e.u8(self.tag.wire())?;
        e.u64(self.index)?;
        self.data.encode_cbor(e)?;
        e.array(2)?;
        e.u64(self.ex_units.mem)?;
        e.u64(self.ex_units.steps)?;
        Ok(())
    }
}

/// Witness material the builder produces: datum preimages and redeemers.
/// Signatures are attached downstream and are out of scope here.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct WitnessSet {
    pub plutus_data: Vec<PlutusData>,
    pub redeemers: Vec<Redeemer>,
}

impl WitnessSet {
    pub fn is_empty(&self) -> bool {
        self.plutus_data.is_empty() && self.redeemers.is_empty()
    }

    /// The redeemer array exactly as it appears under witness key 5; also
    /// the first section of the script-data hash preimage.
    pub fn redeemers_cbor(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut e = minicbor::Encoder::new(&mut buf);
        encode_redeemers(&self.redeemers, &mut e)
            .unwrap_or_else(|_| unreachable!("vec writes are infallible"));
        buf
    }

    /// The datum array under witness key 4, when any datums are present.
    pub fn plutus_data_cbor(&self) -> Option<Vec<u8>> {
        if self.plutus_data.is_empty() {
            return None;
        }
        let mut buf = Vec::new();
        let mut e = minicbor::Encoder::new(&mut buf);
        encode_plutus_data(&self.plutus_data, &mut e)
            .unwrap_or_else(|_| unreachable!("vec writes are infallible"));
        Some(buf)
    }
}

fn encode_redeemers(redeemers: &[Redeemer], e: &mut Enc<'_>) -> Result<(), EncodeError> {
    e.array(redeemers.len() as u64)?;
    for r in redeemers {
        r.encode_cbor(e)?;
    }
    Ok(())
}

fn encode_plutus_data(data: &[PlutusData], e: &mut Enc<'_>) -> Result<(), EncodeError> {
    e.array(data.len() as u64)?;
    for d in data {
        d.encode_cbor(e)?;
    }
    Ok(())
}

impl CanonicalCbor for WitnessSet {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        let len = !self.plutus_data.is_empty() as u64 + !self.redeemers.is_empty() as u64;
        e.map(len)?;
        if !self.plutus_data.is_empty() {
            e.u8(4)?;
            encode_plutus_data(&self.plutus_data, e)?;
        }
        if !self.redeemers.is_empty() {
            e.u8(5)?;
            encode_redeemers(&self.redeemers, e)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkId {
    Testnet,
    Mainnet,
}

impl NetworkId {
    pub fn wire(self) -> u8 {
        match self {
            NetworkId::Testnet => 0,
            NetworkId::Mainnet => 1,
        }
    }
}

/// A metadata value. Maps keep caller order; metadata is hashed as given and
/// the ledger imposes no key ordering on it.
#[derive(Clone, Debug, PartialEq)]
pub enum Metadatum {
    Int(i64),
    Bytes(Vec<u8>),
    Text(String),
    List(Vec<Metadatum>),
    Map(Vec<(Metadatum, Metadatum)>),
}

impl CanonicalCbor for Metadatum {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        match self {
            Metadatum::Int(i) => {
                e.i64(*i)?;
            }
            Metadatum::Bytes(b) => {
                e.bytes(b)?;
            }
            Metadatum::Text(s) => {
                e.str(s)?;
            }
            Metadatum::List(items) => {
                e.array(items.len() as u64)?;
                for item in items {
                    item.encode_cbor(e)?;
                }
            }
            Metadatum::Map(pairs) => {
                e.map(pairs.len() as u64)?;
                for (k, v) in pairs {
                    k.encode_cbor(e)?;
                    v.encode_cbor(e)?;
                }
            }
        }
        Ok(())
    }
}

/// Transaction metadata, encoded under tag 259 and hashed with Blake2b-256
/// into body key 7.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct AuxiliaryData {
    pub metadata: BTreeMap<u64, Metadatum>,
}

impl AuxiliaryData {
    pub fn hash(&self) -> Hash<32> {
        blake2b_256(&self.to_cbor())
    }
}

impl CanonicalCbor for AuxiliaryData {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        e.tag(Tag::Unassigned(259))?;
        e.map(1)?;
        e.u8(0)?;
        e.map(self.metadata.len() as u64)?;
        for (label, value) in &self.metadata {
            e.u64(*label)?;
            value.encode_cbor(e)?;
        }
        Ok(())
    }
}

/// An opaque, already-encoded certificate, written through verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate(Vec<u8>);

impl Certificate {
    pub fn new(cbor: Vec<u8>) -> Self {
        Self(cbor)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Certificate({})", hex::encode(&self.0))
    }
}

impl CanonicalCbor for Certificate {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        raw(e, &self.0)
    }
}

/// The transaction body: everything that is hashed into the transaction id.
///
/// Vec-typed fields are expected to already be in canonical order; the
/// assembler sorts input sets before constructing a body.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct TransactionBody {
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub fee: u64,
    pub ttl: Option<u64>,
    pub certificates: Vec<Certificate>,
    pub withdrawals: BTreeMap<Address, u64>,
    pub auxiliary_data_hash: Option<Hash<32>>,
    pub validity_start: Option<u64>,
    pub mint: Mint,
    pub script_data_hash: Option<Hash<32>>,
    pub collateral: Vec<TransactionInput>,
    pub required_signers: Vec<AddrKeyhash>,
    pub network_id: Option<NetworkId>,
    pub collateral_return: Option<TransactionOutput>,
    pub total_collateral: Option<u64>,
    pub reference_inputs: Vec<TransactionInput>,
}

impl TransactionBody {
    pub fn id(&self) -> TransactionId {
        blake2b_256(&self.to_cbor())
    }
}

fn encode_input_set(inputs: &[TransactionInput], e: &mut Enc<'_>) -> Result<(), EncodeError> {
    e.array(inputs.len() as u64)?;
    for input in inputs {
        input.encode_cbor(e)?;
    }
    Ok(())
}

impl CanonicalCbor for TransactionBody {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        let len = 3
            + self.ttl.is_some() as u64
            + !self.certificates.is_empty() as u64
            + !self.withdrawals.is_empty() as u64
            + self.auxiliary_data_hash.is_some() as u64
            + self.validity_start.is_some() as u64
            + !self.mint.is_empty() as u64
            + self.script_data_hash.is_some() as u64
            + !self.collateral.is_empty() as u64
            + !self.required_signers.is_empty() as u64
            + self.network_id.is_some() as u64
            + self.collateral_return.is_some() as u64
            + self.total_collateral.is_some() as u64
            + !self.reference_inputs.is_empty() as u64;
        e.map(len)?;

        e.u8(0)?;
        encode_input_set(&self.inputs, e)?;
        e.u8(1)?;
        e.array(self.outputs.len() as u64)?;
        for output in &self.outputs {
            output.encode_cbor(e)?;
        }
        e.u8(2)?;
        e.u64(self.fee)?;
        if let Some(ttl) = self.ttl {
            e.u8(3)?;
            e.u64(ttl)?;
        }
        if !self.certificates.is_empty() {
            e.u8(4)?;
            e.array(self.certificates.len() as u64)?;
            for cert in &self.certificates {
                cert.encode_cbor(e)?;
            }
        }
        if !self.withdrawals.is_empty() {
            e.u8(5)?;
            e.map(self.withdrawals.len() as u64)?;
            for (account, coin) in &self.withdrawals {
                account.encode_cbor(e)?;
                e.u64(*coin)?;
            }
        }
        if let Some(hash) = &self.auxiliary_data_hash {
            e.u8(7)?;
            hash.encode_cbor(e)?;
        }
        if let Some(start) = self.validity_start {
            e.u8(8)?;
            e.u64(start)?;
        }
        if !self.mint.is_empty() {
            e.u8(9)?;
            self.mint.encode_cbor(e)?;
        }
        if let Some(hash) = &self.script_data_hash {
            e.u8(11)?;
            hash.encode_cbor(e)?;
        }
        if !self.collateral.is_empty() {
            e.u8(13)?;
            encode_input_set(&self.collateral, e)?;
        }
        if !self.required_signers.is_empty() {
            e.u8(14)?;
            e.array(self.required_signers.len() as u64)?;
            for signer in &self.required_signers {
                signer.encode_cbor(e)?;
            }
        }
        if let Some(id) = self.network_id {
            e.u8(15)?;
            e.u8(id.wire())?;
        }
        if let Some(ret) = &self.collateral_return {
            e.u8(16)?;
            ret.encode_cbor(e)?;
        }
        if let Some(total) = self.total_collateral {
            e.u8(17)?;
            e.u64(total)?;
        }
        if !self.reference_inputs.is_empty() {
            e.u8(18)?;
            encode_input_set(&self.reference_inputs, e)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub body: TransactionBody,
    pub witness_set: WitnessSet,
    pub is_valid: bool,
    pub auxiliary_data: Option<AuxiliaryData>,
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        self.body.id()
    }
}

impl CanonicalCbor for Transaction {
    fn encode_cbor(&self, e: &mut Enc<'_>) -> Result<(), EncodeError> {
        e.array(4)?;
        self.body.encode_cbor(e)?;
        self.witness_set.encode_cbor(e)?;
        e.bool(self.is_valid)?;
        match &self.auxiliary_data {
            Some(aux) => aux.encode_cbor(e)?,
            None => {
                e.null()?;
            }
        }
        Ok(())
    }
}
