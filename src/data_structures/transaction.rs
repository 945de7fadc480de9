//! Transaction model and binary wire format
//!
//! Layout of a serialized transaction:
//!
//! ```text
//! funds      signal_bits:1 version:1 [tokens_len:1] inputs_len:1 outputs_len:1
//!            [tokens:32*n] inputs outputs
//! token info (create-token transactions only)
//! graph      weight:f64 timestamp:4 parents_len:1 parents:32*n
//! nonce      4
//! headers    id:1 payload
//! ```
//!
//! Create-token transactions omit the token list; the token being created is
//! implicitly at index 1. Signing data is the funds section with empty input
//! data, followed by the token info block and headers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    constants::{
        CREATE_TOKEN_TX_VERSION, DEFAULT_SIGNAL_BITS, DEFAULT_TX_VERSION, FEE_HEADER_ID, HASH_SIZE,
        MAX_INPUTS, MAX_OUTPUTS, MAX_OUTPUT_VALUE_32, NATIVE_TOKEN_UID, TOKEN_AUTHORITY_MASK,
        TOKEN_INDEX_MASK,
    },
    data_structures::create_token_transaction::TokenInfo,
    errors::{SerializationError, WalletError, WalletResult},
};

/// Cursor over a byte buffer that reports which field ran out of data
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn read_bytes(
        &mut self,
        len: usize,
        field: &'static str,
    ) -> Result<&'a [u8], SerializationError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(SerializationError::UnexpectedEof(field))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(
        &mut self,
        field: &'static str,
    ) -> Result<[u8; N], SerializationError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, field)?);
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self, field: &'static str) -> Result<u8, SerializationError> {
        Ok(self.read_array::<1>(field)?[0])
    }

    fn read_u16(&mut self, field: &'static str) -> Result<u16, SerializationError> {
        Ok(u16::from_be_bytes(self.read_array(field)?))
    }

    fn read_u32(&mut self, field: &'static str) -> Result<u32, SerializationError> {
        Ok(u32::from_be_bytes(self.read_array(field)?))
    }

    fn read_f64(&mut self, field: &'static str) -> Result<f64, SerializationError> {
        Ok(f64::from_be_bytes(self.read_array(field)?))
    }

    fn read_hash(&mut self, field: &'static str) -> Result<String, SerializationError> {
        Ok(hex::encode(self.read_bytes(HASH_SIZE, field)?))
    }

    fn peek_u8(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

fn write_hash(buf: &mut Vec<u8>, value: &str, field: &str) -> Result<(), SerializationError> {
    let bytes = hex::decode(value)?;
    if bytes.len() != HASH_SIZE {
        return Err(SerializationError::InvalidTokenUid(format!(
            "{field} {value} must be {HASH_SIZE} bytes"
        )));
    }
    buf.extend_from_slice(&bytes);
    Ok(())
}

/// Output values up to `2^31 - 1` take 4 bytes, larger values are written as
/// a negated 8-byte integer so the sign bit tells the reader which width to use.
pub(crate) fn write_output_value(buf: &mut Vec<u8>, value: u64) {
    if value > MAX_OUTPUT_VALUE_32 {
        buf.extend_from_slice(&(-(value as i64)).to_be_bytes());
    } else {
        buf.extend_from_slice(&(value as i32).to_be_bytes());
    }
}

pub(crate) fn read_output_value(reader: &mut ByteReader<'_>) -> Result<u64, SerializationError> {
    match reader.peek_u8() {
        Some(first) if first & 0x80 != 0 => {
            let raw = i64::from_be_bytes(reader.read_array("output value")?);
            Ok(raw.unsigned_abs())
        }
        Some(_) => {
            let raw = i32::from_be_bytes(reader.read_array("output value")?);
            Ok(raw as u64)
        }
        None => Err(SerializationError::UnexpectedEof("output value")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub tx_id: String,
    pub index: u8,
    pub data: Vec<u8>,
}

impl Input {
    pub fn new(tx_id: impl Into<String>, index: u8) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
            data: Vec::new(),
        }
    }

    fn serialize(&self, buf: &mut Vec<u8>, with_data: bool) -> Result<(), SerializationError> {
        write_hash(buf, &self.tx_id, "input tx_id")?;
        buf.push(self.index);
        if with_data {
            buf.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
            buf.extend_from_slice(&self.data);
        } else {
            buf.extend_from_slice(&0u16.to_be_bytes());
        }
        Ok(())
    }

    fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, SerializationError> {
        let tx_id = reader.read_hash("input tx_id")?;
        let index = reader.read_u8("input index")?;
        let len = reader.read_u16("input data length")? as usize;
        let data = reader.read_bytes(len, "input data")?.to_vec();
        Ok(Self { tx_id, index, data })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Amount for value outputs, authority bitmask for authority outputs
    pub value: u64,
    pub token_data: u8,
    pub script: Vec<u8>,
}

impl Output {
    pub fn new(value: u64, token_data: u8, script: Vec<u8>) -> Self {
        Self {
            value,
            token_data,
            script,
        }
    }

    pub fn is_authority(&self) -> bool {
        self.token_data & TOKEN_AUTHORITY_MASK != 0
    }

    pub fn token_index(&self) -> usize {
        (self.token_data & TOKEN_INDEX_MASK) as usize
    }

    fn serialize(&self, buf: &mut Vec<u8>) {
        write_output_value(buf, self.value);
        buf.push(self.token_data);
        buf.extend_from_slice(&(self.script.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.script);
    }

    fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, SerializationError> {
        let value = read_output_value(reader)?;
        let token_data = reader.read_u8("output token_data")?;
        let len = reader.read_u16("output script length")? as usize;
        let script = reader.read_bytes(len, "output script")?.to_vec();
        Ok(Self {
            value,
            token_data,
            script,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEntry {
    pub token_index: u8,
    pub amount: u64,
}

/// Records the fee charged by the transaction, always in the native token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeHeader {
    pub entries: Vec<FeeEntry>,
}

impl FeeHeader {
    pub fn native(amount: u64) -> Self {
        Self {
            entries: vec![FeeEntry {
                token_index: 0,
                amount,
            }],
        }
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|e| e.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Header {
    Fee(FeeHeader),
}

impl Header {
    fn serialize(&self, buf: &mut Vec<u8>) {
        match self {
            Header::Fee(fee) => {
                buf.push(FEE_HEADER_ID);
                buf.push(fee.entries.len() as u8);
                for entry in &fee.entries {
                    buf.push(entry.token_index);
                    write_output_value(buf, entry.amount);
                }
            }
        }
    }

    fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, SerializationError> {
        match reader.read_u8("header id")? {
            FEE_HEADER_ID => {
                let count = reader.read_u8("fee header length")?;
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let token_index = reader.read_u8("fee token index")?;
                    let amount = read_output_value(reader)?;
                    entries.push(FeeEntry {
                        token_index,
                        amount,
                    });
                }
                Ok(Header::Fee(FeeHeader { entries }))
            }
            other => Err(SerializationError::UnknownHeader(other)),
        }
    }
}

/// Result of proof-of-work, merged into the transaction after mining
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinedTxData {
    pub parents: Vec<String>,
    pub timestamp: u32,
    pub nonce: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub signal_bits: u8,
    pub version: u8,
    /// Custom token uids referenced by `token_data` (index 0 is the native token)
    pub tokens: Vec<String>,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub weight: f64,
    pub timestamp: u32,
    pub parents: Vec<String>,
    pub nonce: u32,
    pub headers: Vec<Header>,
    pub token_info: Option<TokenInfo>,
    pub hash: Option<String>,
}

impl Transaction {
    pub fn new(inputs: Vec<Input>, outputs: Vec<Output>, tokens: Vec<String>) -> Self {
        Self {
            signal_bits: DEFAULT_SIGNAL_BITS,
            version: DEFAULT_TX_VERSION,
            tokens,
            inputs,
            outputs,
            weight: 0.0,
            timestamp: 0,
            parents: Vec::new(),
            nonce: 0,
            headers: Vec::new(),
            token_info: None,
            hash: None,
        }
    }

    pub fn is_create_token(&self) -> bool {
        self.version == CREATE_TOKEN_TX_VERSION
    }

    pub fn fee_header(&self) -> Option<&FeeHeader> {
        self.headers.iter().find_map(|header| match header {
            Header::Fee(fee) => Some(fee),
        })
    }

    /// Token uid of an output, resolving index 0 to the native token
    pub fn output_token(&self, output: &Output) -> Option<String> {
        match output.token_index() {
            0 => Some(NATIVE_TOKEN_UID.to_string()),
            _ if self.is_create_token() => self.hash.clone(),
            i => self.tokens.get(i - 1).cloned(),
        }
    }

    pub fn apply_mined_data(&mut self, data: &MinedTxData) {
        self.parents = data.parents.clone();
        self.timestamp = data.timestamp;
        self.nonce = data.nonce;
        self.weight = data.weight;
    }

    fn validate_counts(&self) -> Result<(), SerializationError> {
        if self.inputs.len() > MAX_INPUTS {
            return Err(SerializationError::FieldTooLong {
                field: "inputs",
                len: self.inputs.len(),
                max: MAX_INPUTS,
            });
        }
        if self.outputs.len() > MAX_OUTPUTS {
            return Err(SerializationError::FieldTooLong {
                field: "outputs",
                len: self.outputs.len(),
                max: MAX_OUTPUTS,
            });
        }
        Ok(())
    }

    fn serialize_funds(&self, buf: &mut Vec<u8>, with_input_data: bool) -> WalletResult<()> {
        self.validate_counts()?;
        buf.push(self.signal_bits);
        buf.push(self.version);
        if !self.is_create_token() {
            buf.push(self.tokens.len() as u8);
        }
        buf.push(self.inputs.len() as u8);
        buf.push(self.outputs.len() as u8);
        if !self.is_create_token() {
            for token in &self.tokens {
                write_hash(buf, token, "token uid")?;
            }
        }
        for input in &self.inputs {
            input.serialize(buf, with_input_data)?;
        }
        for output in &self.outputs {
            output.serialize(buf);
        }
        Ok(())
    }

    fn serialize_token_info(&self, buf: &mut Vec<u8>) -> WalletResult<()> {
        if self.is_create_token() {
            let info = self.token_info.as_ref().ok_or_else(|| {
                WalletError::InvalidState("create-token transaction without token info".into())
            })?;
            info.serialize(buf)?;
        }
        Ok(())
    }

    fn serialize_graph(&self, buf: &mut Vec<u8>) -> WalletResult<()> {
        buf.extend_from_slice(&self.weight.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.push(self.parents.len() as u8);
        for parent in &self.parents {
            write_hash(buf, parent, "parent")?;
        }
        Ok(())
    }

    fn serialize_headers(&self, buf: &mut Vec<u8>) {
        for header in &self.headers {
            header.serialize(buf);
        }
    }

    /// Bytes covered by input signatures
    pub fn data_to_sign(&self) -> WalletResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize_funds(&mut buf, false)?;
        self.serialize_token_info(&mut buf)?;
        self.serialize_headers(&mut buf);
        Ok(buf)
    }

    pub fn to_bytes(&self) -> WalletResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize_funds(&mut buf, true)?;
        self.serialize_token_info(&mut buf)?;
        self.serialize_graph(&mut buf)?;
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        self.serialize_headers(&mut buf);
        Ok(buf)
    }

    pub fn to_hex(&self) -> WalletResult<String> {
        Ok(hex::encode(self.to_bytes()?))
    }

    pub fn from_bytes(bytes: &[u8]) -> WalletResult<Self> {
        let mut reader = ByteReader::new(bytes);
        let signal_bits = reader.read_u8("signal bits")?;
        let version = reader.read_u8("version")?;
        let is_create_token = version == CREATE_TOKEN_TX_VERSION;
        let tokens_len = if is_create_token {
            0
        } else {
            reader.read_u8("tokens length")?
        };
        let inputs_len = reader.read_u8("inputs length")?;
        let outputs_len = reader.read_u8("outputs length")?;

        let tokens = (0..tokens_len)
            .map(|_| reader.read_hash("token uid"))
            .collect::<Result<Vec<_>, _>>()?;
        let inputs = (0..inputs_len)
            .map(|_| Input::deserialize(&mut reader))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = (0..outputs_len)
            .map(|_| Output::deserialize(&mut reader))
            .collect::<Result<Vec<_>, _>>()?;

        let token_info = if is_create_token {
            Some(TokenInfo::deserialize(&mut reader)?)
        } else {
            None
        };

        let weight = reader.read_f64("weight")?;
        let timestamp = reader.read_u32("timestamp")?;
        let parents_len = reader.read_u8("parents length")?;
        let parents = (0..parents_len)
            .map(|_| reader.read_hash("parent"))
            .collect::<Result<Vec<_>, _>>()?;
        let nonce = reader.read_u32("nonce")?;

        let mut headers = Vec::new();
        while reader.remaining() > 0 {
            headers.push(Header::deserialize(&mut reader)?);
        }

        let mut tx = Self {
            signal_bits,
            version,
            tokens,
            inputs,
            outputs,
            weight,
            timestamp,
            parents,
            nonce,
            headers,
            token_info,
            hash: None,
        };
        tx.update_hash()?;
        Ok(tx)
    }

    pub fn from_hex(hex_str: &str) -> WalletResult<Self> {
        let bytes = hex::decode(hex_str).map_err(SerializationError::from)?;
        Self::from_bytes(&bytes)
    }

    /// Double SHA-256 of the serialized transaction, byte-reversed
    pub fn calculate_hash(&self) -> WalletResult<String> {
        let bytes = self.to_bytes()?;
        let mut digest = Sha256::digest(Sha256::digest(&bytes)).to_vec();
        digest.reverse();
        Ok(hex::encode(digest))
    }

    pub fn update_hash(&mut self) -> WalletResult<&str> {
        let hash = self.calculate_hash()?;
        Ok(self.hash.insert(hash).as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        let mut input = Input::new("aa".repeat(32), 1);
        input.data = vec![1, 2, 3];
        let outputs = vec![
            Output::new(100, 0, vec![0x76, 0xa9]),
            Output::new(5_000_000_000, 1, vec![0xac]),
            Output::new(0b11, 1 | TOKEN_AUTHORITY_MASK, vec![0xac]),
        ];
        let mut tx = Transaction::new(vec![input], outputs, vec!["bb".repeat(32)]);
        tx.headers.push(Header::Fee(FeeHeader::native(2)));
        tx.apply_mined_data(&MinedTxData {
            parents: vec!["cc".repeat(32), "dd".repeat(32)],
            timestamp: 1_700_000_000,
            nonce: 42,
            weight: 17.5,
        });
        tx
    }

    #[test]
    fn test_output_value_widths() {
        let mut buf = Vec::new();
        write_output_value(&mut buf, 10);
        assert_eq!(buf.len(), 4);
        write_output_value(&mut buf, MAX_OUTPUT_VALUE_32 + 1);
        assert_eq!(buf.len(), 12);
        let mut reader = ByteReader::new(&buf);
        assert_eq!(read_output_value(&mut reader).unwrap(), 10);
        assert_eq!(
            read_output_value(&mut reader).unwrap(),
            MAX_OUTPUT_VALUE_32 + 1
        );
    }

    #[test]
    fn test_transaction_bytes_parse_back() {
        let tx = sample_tx();
        let parsed = Transaction::from_bytes(&tx.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.inputs, tx.inputs);
        assert_eq!(parsed.outputs, tx.outputs);
        assert_eq!(parsed.tokens, tx.tokens);
        assert_eq!(parsed.headers, tx.headers);
        assert_eq!(parsed.parents, tx.parents);
        assert_eq!(parsed.nonce, 42);
        assert_eq!(parsed.fee_header().unwrap().total(), 2);
        assert!(parsed.outputs[2].is_authority());
    }

    #[test]
    fn test_data_to_sign_ignores_input_data() {
        let mut tx = sample_tx();
        let before = tx.data_to_sign().unwrap();
        tx.inputs[0].data = vec![9; 70];
        assert_eq!(tx.data_to_sign().unwrap(), before);
        assert_ne!(tx.calculate_hash().unwrap(), sample_tx().calculate_hash().unwrap());
    }

    #[test]
    fn test_truncated_bytes_fail() {
        let bytes = sample_tx().to_bytes().unwrap();
        let err = Transaction::from_bytes(&bytes[..10]).unwrap_err();
        assert!(matches!(
            err,
            WalletError::Serialization(SerializationError::UnexpectedEof(_))
        ));
    }

    #[test]
    fn test_output_token_resolution() {
        let tx = sample_tx();
        assert_eq!(tx.output_token(&tx.outputs[0]).unwrap(), NATIVE_TOKEN_UID);
        assert_eq!(tx.output_token(&tx.outputs[1]).unwrap(), "bb".repeat(32));
    }
}
