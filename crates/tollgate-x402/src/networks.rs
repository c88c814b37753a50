//! Chain tags and stablecoin asset addresses.
//!
//! Payments settle in USDC on Base; the testnet flag selects Base
//! Sepolia. Networks are identified by CAIP-2 chain ids.

/// CAIP-2 tag for Base mainnet.
pub const BASE_MAINNET: &str = "eip155:8453";

/// CAIP-2 tag for Base Sepolia.
pub const BASE_SEPOLIA: &str = "eip155:84532";

/// USDC contract address on Base mainnet.
pub const USDC_BASE_MAINNET: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

/// USDC contract address on Base Sepolia.
pub const USDC_BASE_SEPOLIA: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

/// EIP-712 domain name of the stablecoin.
pub const USDC_NAME: &str = "USDC";

/// EIP-712 domain version of the stablecoin.
pub const USDC_VERSION: &str = "2";

/// Number of decimals in the stablecoin's atomic representation.
pub const USDC_DECIMALS: u32 = 6;

/// Select the network tag for the given environment.
#[must_use]
pub fn network_for(testnet: bool) -> &'static str {
    if testnet {
        BASE_SEPOLIA
    } else {
        BASE_MAINNET
    }
}

/// Select the USDC asset address for the given environment.
#[must_use]
pub fn usdc_asset(testnet: bool) -> &'static str {
    if testnet {
        USDC_BASE_SEPOLIA
    } else {
        USDC_BASE_MAINNET
    }
}

/// Extract the numeric chain id from a CAIP-2 tag (`eip155:8453` → 8453).
#[must_use]
pub fn chain_id(network: &str) -> Option<i64> {
    network.split_once(':').and_then(|(_, id)| id.parse().ok())
}
