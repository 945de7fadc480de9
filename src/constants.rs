//! Network-wide constants used by transaction assembly

/// Uid of the native token (HTR)
pub const NATIVE_TOKEN_UID: &str = "00";

/// Native-token units charged per non-authority output of a fee-model token
pub const FEE_PER_OUTPUT: u64 = 1;

/// Percent of the minted amount deposited in the native token for
/// deposit-model tokens
pub const TOKEN_DEPOSIT_PERCENT: u64 = 1;

/// Cost in native-token units of every data-carrier output
pub const DATA_SCRIPT_OUTPUT_VALUE: u64 = 1;

/// Maximum byte length of the payload of a data-carrier output
pub const MAX_DATA_SCRIPT_LENGTH: usize = 150;

/// Authority bit allowing new units to be minted
pub const TOKEN_MINT_MASK: u8 = 0b01;
/// Authority bit allowing units to be melted
pub const TOKEN_MELT_MASK: u8 = 0b10;
/// Flag set on `token_data` for authority outputs
pub const TOKEN_AUTHORITY_MASK: u8 = 0x80;
/// Lower bits of `token_data` holding the token index
pub const TOKEN_INDEX_MASK: u8 = 0x7f;

/// Known version tag of the create-token info block
pub const TOKEN_INFO_VERSION: u8 = 1;

pub const DEFAULT_TX_VERSION: u8 = 1;
pub const CREATE_TOKEN_TX_VERSION: u8 = 2;
pub const DEFAULT_SIGNAL_BITS: u8 = 0;

/// Header id of the fee header in the serialized transaction
pub const FEE_HEADER_ID: u8 = 0x11;

/// Maximum byte length of token names and symbols (1-byte length prefix)
pub const MAX_TOKEN_NAME_SIZE: usize = 255;
pub const MAX_TOKEN_SYMBOL_SIZE: usize = 255;

/// Values above this are serialized as 8-byte negated integers
pub const MAX_OUTPUT_VALUE_32: u64 = (1 << 31) - 1;
pub const MAX_OUTPUT_VALUE: u64 = 1 << 43;

pub const MAX_INPUTS: usize = 255;
pub const MAX_OUTPUTS: usize = 255;

/// Byte length of transaction hashes and token uids
pub const HASH_SIZE: usize = 32;
