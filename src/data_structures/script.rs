//! Output scripts and input data
//!
//! Only the script templates the wallet produces are supported: P2PKH and
//! P2SH (each optionally prefixed with a timelock) and data-carrier scripts.

use crate::{
    data_structures::address::{Address, AddressKind, Network},
    errors::SerializationError,
};

pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_GREATERTHAN_TIMESTAMP: u8 = 0x6f;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

const MAX_DIRECT_PUSH: usize = 75;
const MAX_PUSHDATA1: usize = u8::MAX as usize;

/// Append a data push (direct or `OP_PUSHDATA1`)
pub fn push_data(script: &mut Vec<u8>, data: &[u8]) -> Result<(), SerializationError> {
    match data.len() {
        len @ 0..=MAX_DIRECT_PUSH => script.push(len as u8),
        len @ 0..=MAX_PUSHDATA1 => {
            script.push(OP_PUSHDATA1);
            script.push(len as u8);
        }
        len => {
            return Err(SerializationError::FieldTooLong {
                field: "script push",
                len,
                max: MAX_PUSHDATA1,
            })
        }
    }
    script.extend_from_slice(data);
    Ok(())
}

/// Direct push of a fixed-size value
fn push_fixed<const N: usize>(script: &mut Vec<u8>, data: &[u8; N]) {
    script.push(N as u8);
    script.extend_from_slice(data);
}

fn push_timelock(script: &mut Vec<u8>, timelock: Option<u32>) {
    if let Some(timelock) = timelock {
        push_fixed(script, &timelock.to_be_bytes());
        script.push(OP_GREATERTHAN_TIMESTAMP);
    }
}

pub fn p2pkh_script(hash: &[u8; 20], timelock: Option<u32>) -> Vec<u8> {
    let mut script = Vec::with_capacity(31);
    push_timelock(&mut script, timelock);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    push_fixed(&mut script, hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

pub fn p2sh_script(hash: &[u8; 20], timelock: Option<u32>) -> Vec<u8> {
    let mut script = Vec::with_capacity(29);
    push_timelock(&mut script, timelock);
    script.push(OP_HASH160);
    push_fixed(&mut script, hash);
    script.push(OP_EQUAL);
    script
}

pub fn output_script(address: &Address, timelock: Option<u32>) -> Vec<u8> {
    match address.kind() {
        AddressKind::P2pkh => p2pkh_script(address.hash(), timelock),
        AddressKind::P2sh => p2sh_script(address.hash(), timelock),
    }
}

/// Data-carrier script: the data push followed by `OP_CHECKSIG`
pub fn data_script(data: &[u8]) -> Result<Vec<u8>, SerializationError> {
    let mut script = Vec::with_capacity(data.len() + 3);
    push_data(&mut script, data)?;
    script.push(OP_CHECKSIG);
    Ok(script)
}

/// Unlocking data for a P2PKH input
pub fn p2pkh_input_data(signature: &[u8], public_key: &[u8]) -> Result<Vec<u8>, SerializationError> {
    let mut data = Vec::with_capacity(signature.len() + public_key.len() + 4);
    push_data(&mut data, signature)?;
    push_data(&mut data, public_key)?;
    Ok(data)
}

/// Address and timelock recovered from a standard output script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScript {
    pub address: Address,
    pub timelock: Option<u32>,
}

/// Recover the address of a P2PKH/P2SH script, `None` for anything else
pub fn parse_output_script(script: &[u8], network: &Network) -> Option<ParsedScript> {
    let (timelock, rest) = match script {
        [4, a, b, c, d, OP_GREATERTHAN_TIMESTAMP, rest @ ..] => {
            (Some(u32::from_be_bytes([*a, *b, *c, *d])), rest)
        }
        _ => (None, script),
    };
    let (kind, hash) = match rest {
        [OP_DUP, OP_HASH160, 20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
            (AddressKind::P2pkh, hash)
        }
        [OP_HASH160, 20, hash @ .., OP_EQUAL] if hash.len() == 20 => (AddressKind::P2sh, hash),
        _ => return None,
    };
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(hash);
    Some(ParsedScript {
        address: Address::from_hash(bytes, kind, network),
        timelock,
    })
}
