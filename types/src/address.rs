//! Ledger addresses: `0x`-prefixed, 20-byte hex strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypeError;

/// Number of bytes in a ledger address.
const ADDRESS_LEN: usize = 20;

/// The standard prefix for every ledger address.
const PREFIX: &str = "0x";

fn validate(raw: &str) -> Result<String, TypeError> {
    let body = raw
        .strip_prefix(PREFIX)
        .ok_or_else(|| TypeError::InvalidAddress(format!("{raw}: missing 0x prefix")))?;
    let bytes = hex::decode(body).map_err(|e| TypeError::InvalidAddress(format!("{raw}: {e}")))?;
    if bytes.len() != ADDRESS_LEN {
        return Err(TypeError::InvalidAddress(format!(
            "{raw}: expected {ADDRESS_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    // Normalise to lowercase so equality does not depend on checksum casing.
    Ok(format!("{PREFIX}{}", hex::encode(bytes)))
}

/// The address of a connected identity (the account that signs transactions).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityAddress(String);

impl IdentityAddress {
    /// Parse and normalise an identity address.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        validate(raw).map(Self)
    }

    /// Build an address from raw bytes.
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(format!("{PREFIX}{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IdentityAddress {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The address of the voting contract that encrypted inputs are bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractAddress(String);

impl ContractAddress {
    /// Parse and normalise a contract address.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        validate(raw).map(Self)
    }

    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(format!("{PREFIX}{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContractAddress {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
