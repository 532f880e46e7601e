//! Hash identity: double SHA-256 and the display byte order.
//!
//! Hashes are stored and compared in internal byte order (the order in which
//! they appear on disk). By convention they are shown to users as hex with the
//! bytes reversed; `Display`/`FromStr` on [`Hash256`] use that display order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0; 32]);

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(slice).ok().map(Hash256)
    }

    /// Parses display-order hex, i.e. what a block explorer or RPC shows.
    pub fn from_display_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        bytes.reverse();
        Ok(Hash256(bytes))
    }

    pub fn to_display_hex(&self) -> String {
        hex::encode(self.reversed())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn reversed(&self) -> [u8; 32] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_display_hex())
    }
}

impl FromStr for Hash256 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash256::from_display_hex(s)
    }
}

impl Serialize for Hash256 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_display_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let s = String::deserialize(deserializer)?;
        Hash256::from_display_hex(&s).map_err(D::Error::custom)
    }
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn double_sha256(data: &[u8]) -> Hash256 {
    Hash256(sha256(&sha256(data)))
}

/// Returns a copy of `bytes` in reverse order; the input is left untouched.
pub fn reverse_bytes(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn test_double_sha256_is_sha256_twice() {
        let inputs: [&[u8]; 3] = [b"", b"abc", &[0u8; 80]];
        for input in inputs {
            assert_eq!(double_sha256(input).0, sha256(&sha256(input)));
        }
        assert_eq!(
            double_sha256(b"").0,
            hex!("5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456")
        );
    }

    #[test]
    fn test_reverse_bytes() {
        let bytes = hex!("0102030405");
        let reversed = reverse_bytes(&bytes);

        assert_eq!(reversed, hex!("0504030201"));
        assert_eq!(bytes, hex!("0102030405"));
        assert_eq!(reverse_bytes(&reversed), bytes);
        assert!(reverse_bytes(&[]).is_empty());
    }

    #[test]
    fn test_display_order() {
        const GENESIS: &str = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

        let hash: Hash256 = GENESIS.parse().unwrap();
        assert_eq!(hash.0[0], 0x6f);
        assert_eq!(hash.0[31], 0x00);
        assert_eq!(hash.to_string(), GENESIS);
        assert_eq!(Hash256(hash.reversed()).reversed(), hash.0);
    }

    #[test]
    fn test_rejects_bad_hex() {
        assert!(Hash256::from_display_hex("abcd").is_err());
        assert!(Hash256::from_display_hex(&"zz".repeat(32)).is_err());
        assert!(Hash256::from_slice(&[0u8; 31]).is_none());
        assert!(Hash256::from_slice(&[0u8; 32]).unwrap().is_zero());
    }

    #[test]
    fn test_serde_uses_display_hex() {
        let hash = Hash256([0x11; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "11".repeat(32)));

        let back: Hash256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
