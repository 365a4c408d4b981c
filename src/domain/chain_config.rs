//! 多链配置模块
//!
//! 定义支持的区块链、网络模式以及每条链在各网络下的派生路径

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// 加密曲线类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveType {
    /// secp256k1 曲线 (Bitcoin, Ethereum)，走 BIP32 派生树
    Secp256k1,
    /// ed25519 曲线 (Solana)，走 seed ‖ path 哈希派生
    Ed25519,
}

/// 全局网络模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    /// 解析 network 文件内容，任何无法识别的内容都回落到 mainnet
    pub fn from_file_contents(contents: &str) -> Self {
        contents.trim().parse().unwrap_or_default()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(format!("unknown network '{}', expected mainnet or testnet", other)),
        }
    }
}

/// 支持的链
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Bitcoin,
    Solana,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 派生路径（跨实现兼容，必须逐位一致）
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const ETH_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";
pub const ETH_TESTNET_DERIVATION_PATH: &str = "m/44'/1'/0'/0/0";
pub const BTC_DERIVATION_PATH: &str = "m/44'/0'/0'/0/0";
pub const SOL_DERIVATION_PATH: &str = "m/44'/501'/0'/0'";
pub const SOL_TESTNET_DERIVATION_PATH: &str = "m/44'/501'/0'/1'";

/// EIP-155 链 ID
pub const ETH_MAINNET_CHAIN_ID: u64 = 1;
pub const ETH_SEPOLIA_CHAIN_ID: u64 = 11_155_111;

impl Chain {
    pub const ALL: [Chain; 3] = [Chain::Ethereum, Chain::Bitcoin, Chain::Solana];

    pub fn name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Bitcoin => "Bitcoin",
            Chain::Solana => "Solana",
        }
    }

    /// 原生币符号
    pub fn symbol(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ETH",
            Chain::Bitcoin => "BTC",
            Chain::Solana => "SOL",
        }
    }

    /// 最小单位的小数位数 (wei / satoshi / lamport)
    pub fn decimals(&self) -> u32 {
        match self {
            Chain::Ethereum => 18,
            Chain::Bitcoin => 8,
            Chain::Solana => 9,
        }
    }

    pub fn curve_type(&self) -> CurveType {
        match self {
            Chain::Ethereum | Chain::Bitcoin => CurveType::Secp256k1,
            Chain::Solana => CurveType::Ed25519,
        }
    }

    /// Bitcoin 仅限主网
    pub fn supports(&self, network: Network) -> bool {
        !(matches!(self, Chain::Bitcoin) && network == Network::Testnet)
    }

    /// 该链在指定网络下的派生路径，不支持时返回 None
    pub fn derivation_path(&self, network: Network) -> Option<&'static str> {
        match (self, network) {
            (Chain::Ethereum, Network::Mainnet) => Some(ETH_DERIVATION_PATH),
            (Chain::Ethereum, Network::Testnet) => Some(ETH_TESTNET_DERIVATION_PATH),
            (Chain::Bitcoin, Network::Mainnet) => Some(BTC_DERIVATION_PATH),
            (Chain::Bitcoin, Network::Testnet) => None,
            (Chain::Solana, Network::Mainnet) => Some(SOL_DERIVATION_PATH),
            (Chain::Solana, Network::Testnet) => Some(SOL_TESTNET_DERIVATION_PATH),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eth" | "ethereum" => Ok(Chain::Ethereum),
            "btc" | "bitcoin" => Ok(Chain::Bitcoin),
            "sol" | "solana" => Ok(Chain::Solana),
            other => Err(format!("unsupported chain: {}", other)),
        }
    }
}

/// 按网络选择 Ethereum 链 ID (1 主网 / 11155111 Sepolia)
pub fn chain_id_for(network: Network) -> u64 {
    match network {
        Network::Mainnet => ETH_MAINNET_CHAIN_ID,
        Network::Testnet => ETH_SEPOLIA_CHAIN_ID,
    }
}
