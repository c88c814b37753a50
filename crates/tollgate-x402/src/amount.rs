//! USD amount arithmetic.
//!
//! Prices are configured in USD with up to six decimal places and are
//! converted to atomic stablecoin units (USDC has six decimals) by exact
//! decimal multiplication. Fractions below one atomic unit floor to zero.

use rust_decimal::Decimal;

use crate::networks;
use crate::types::AssetExtra;

/// An amount expressed in atomic stablecoin units with its asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableAmount {
    /// Stablecoin contract address.
    pub asset: String,

    /// Atomic amount as a decimal string (e.g., `"10000"` for $0.01).
    pub amount: String,

    /// EIP-712 domain fields of the asset.
    pub extra: AssetExtra,
}

/// Convert a USD price to atomic USDC units on the selected network.
///
/// The conversion is `floor(usd * 10^6)`, exact for any price whose
/// six-decimal representation fits in 64 bits. Non-positive inputs
/// produce `"0"`.
#[must_use]
pub fn usd_to_stable(usd: Decimal, testnet: bool) -> StableAmount {
    let scale = Decimal::from(10u64.pow(networks::USDC_DECIMALS));
    let atomic = (usd * scale).trunc();
    let amount = if atomic <= Decimal::ZERO {
        "0".to_string()
    } else {
        atomic.normalize().to_string()
    };

    StableAmount {
        asset: networks::usdc_asset(testnet).to_string(),
        amount,
        extra: AssetExtra {
            name: networks::USDC_NAME.to_string(),
            version: networks::USDC_VERSION.to_string(),
        },
    }
}

/// Format a USD amount for display.
///
/// Amounts of at least one cent show two decimal places; smaller amounts
/// show up to six decimals with trailing zeros trimmed.
#[must_use]
pub fn format_usd(usd: Decimal) -> String {
    let cent = Decimal::new(1, 2);
    if usd >= cent {
        format!("{:.2}", usd.round_dp(2))
    } else {
        let rounded = usd.round_dp(6).normalize();
        rounded.to_string()
    }
}
