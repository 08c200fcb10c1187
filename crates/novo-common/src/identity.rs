//! Record identity digests
//!
//! An [`Identity`] is the SHA-256 digest of a record's encoded key columns.
//! It is stored and compared as 32 raw bytes and rendered as 64 lowercase hex
//! characters whenever it leaves the process (state files, logs).

use crate::error::{NovoError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Length of an identity digest in bytes
pub const IDENTITY_LEN: usize = 32;

/// Length of the hex rendering of an identity
pub const IDENTITY_HEX_LEN: usize = IDENTITY_LEN * 2;

/// Fixed-width digest naming a record across runs and execution engines
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity([u8; IDENTITY_LEN]);

impl Identity {
    /// Digest an already-encoded key byte sequence
    pub fn digest(encoded_key: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(encoded_key);
        Self(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    /// Lowercase hex rendering used by the state store
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the 64-character hex rendering
    pub fn from_hex(value: &str) -> Result<Self> {
        if value.len() != IDENTITY_HEX_LEN {
            return Err(NovoError::InvalidIdentity(format!(
                "expected {} hex characters, got {}",
                IDENTITY_HEX_LEN,
                value.len()
            )));
        }

        let mut bytes = [0u8; IDENTITY_LEN];
        hex::decode_to_slice(value, &mut bytes)
            .map_err(|e| NovoError::InvalidIdentity(format!("{}: {}", value, e)))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", &self.to_hex()[..12])
    }
}

impl FromStr for Identity {
    type Err = NovoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Identity::from_hex(&value).map_err(serde::de::Error::custom)
    }
}
