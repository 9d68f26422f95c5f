use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Networks with a known beacon-chain genesis fork version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Goerli,
    Sepolia,
    Holesky,
    Hoodi,
}

impl Network {
    pub const ALL: [Network; 5] = [
        Network::Mainnet,
        Network::Goerli,
        Network::Sepolia,
        Network::Holesky,
        Network::Hoodi,
    ];

    pub fn chain_id(self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Goerli => 5,
            Network::Sepolia => 11_155_111,
            Network::Holesky => 17_000,
            Network::Hoodi => 560_048,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.chain_id() == chain_id)
    }

    /// Fork version the deposit domain is computed with.
    pub fn genesis_fork_version(self) -> [u8; 4] {
        match self {
            Network::Mainnet => [0x00, 0x00, 0x00, 0x00],
            Network::Goerli => [0x00, 0x00, 0x10, 0x20],
            Network::Sepolia => [0x90, 0x00, 0x00, 0x69],
            Network::Holesky => [0x01, 0x01, 0x70, 0x00],
            Network::Hoodi => [0x10, 0x00, 0x09, 0x10],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Goerli => "goerli",
            Network::Sepolia => "sepolia",
            Network::Holesky => "holesky",
            Network::Hoodi => "hoodi",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            // Prater was merged into Goerli.
            "goerli" | "prater" => Ok(Network::Goerli),
            "sepolia" => Ok(Network::Sepolia),
            "holesky" => Ok(Network::Holesky),
            "hoodi" => Ok(Network::Hoodi),
            other => Err(format!("unknown network: {other}")),
        }
    }
}
