use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Magic tag of a mainnet block record, as read little-endian from disk (`f9 be b4 d9`).
pub const MAINNET_MAGIC: u32 = 0xD9B4_BEF9;
/// Magic tag of a testnet3 block record (`0b 11 09 07`).
pub const TESTNET_MAGIC: u32 = 0x0709_110B;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn magic(&self) -> u32 {
        match self {
            Network::Mainnet => MAINNET_MAGIC,
            Network::Testnet => TESTNET_MAGIC,
        }
    }

    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            MAINNET_MAGIC => Some(Network::Mainnet),
            TESTNET_MAGIC => Some(Network::Testnet),
            _ => None,
        }
    }

    /// Sub-directory of the node data dir holding this network's files.
    pub fn data_subdir(&self) -> Option<&'static str> {
        match self {
            Network::Mainnet => None,
            Network::Testnet => Some("testnet3"),
        }
    }

    pub fn default_rpc_port(&self) -> u16 {
        match self {
            Network::Mainnet => 8332,
            Network::Testnet => 18332,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" | "testnet3" => Ok(Network::Testnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_matches_disk_bytes() {
        assert_eq!(
            u32::from_le_bytes([0xf9, 0xbe, 0xb4, 0xd9]),
            Network::Mainnet.magic()
        );
        assert_eq!(
            u32::from_le_bytes([0x0b, 0x11, 0x09, 0x07]),
            Network::Testnet.magic()
        );
        assert_eq!(Network::from_magic(TESTNET_MAGIC), Some(Network::Testnet));
        assert_eq!(Network::from_magic(0), None);
    }

    #[test]
    fn test_parse_aliases() {
        for name in ["main", "Mainnet", "bitcoin"] {
            assert_eq!(name.parse::<Network>().unwrap(), Network::Mainnet);
        }
        for name in ["test", "testnet", "TESTNET3"] {
            assert_eq!(name.parse::<Network>().unwrap(), Network::Testnet);
        }
        assert!("regtest".parse::<Network>().is_err());
        assert_eq!(Network::Testnet.to_string(), "testnet");
    }
}
