use std::fmt;
use std::str::FromStr;

use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TokenRef
// ---------------------------------------------------------------------------

/// An ERC-721 token identified by its collection address and token id.
///
/// This is the key every marketplace listing is stored under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRef {
    pub nft_address: Address,
    pub token_id: U256,
}

impl TokenRef {
    pub fn new(nft_address: Address, token_id: impl Into<U256>) -> Self {
        Self {
            nft_address,
            token_id: token_id.into(),
        }
    }
}

impl fmt::Display for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.nft_address, self.token_id)
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// An active marketplace listing as returned by `getListing`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub price: U256,
    pub seller: Address,
}

impl Listing {
    /// Map the contract's zeroed "no listing" struct to `None`.
    ///
    /// The contract never stores a listing with a zero price, so a zero price
    /// always means the slot is empty.
    pub fn from_raw(price: U256, seller: Address) -> Option<Self> {
        if price.is_zero() {
            None
        } else {
            Some(Self { price, seller })
        }
    }
}

// ---------------------------------------------------------------------------
// Denomination
// ---------------------------------------------------------------------------

/// Unit used to read and print human-entered prices.
///
/// Contract amounts are always in wei; this only affects parsing and display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Denomination {
    Wei,
    Gwei,
    #[default]
    Ether,
}

impl Denomination {
    pub fn decimals(self) -> u8 {
        match self {
            Denomination::Wei => 0,
            Denomination::Gwei => 9,
            Denomination::Ether => 18,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Denomination::Wei => "wei",
            Denomination::Gwei => "gwei",
            Denomination::Ether => "ETH",
        }
    }

    /// Parse a decimal amount (e.g. `"0.1"`) in this unit into wei.
    ///
    /// Negative amounts are rejected here: they can never be encoded as a
    /// `uint256` price, so they are a local input error rather than a
    /// contract rejection.
    pub fn parse_amount(self, amount: &str) -> Result<U256> {
        let trimmed = amount.trim();
        if trimmed.starts_with('-') {
            bail!("amount must not be negative: {trimmed}");
        }

        let parsed = parse_units(trimmed, self.decimals())
            .with_context(|| format!("failed to parse amount {trimmed:?} as {}", self.symbol()))?;

        Ok(<U256 as From<_>>::from(parsed))
    }

    /// Render a wei amount in this unit, trimming trailing zeros.
    pub fn format_amount(self, wei: U256) -> String {
        let raw = format_units(wei, self.decimals()).unwrap_or_else(|_| wei.to_string());

        let trimmed = if raw.contains('.') {
            raw.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            raw
        };

        format!("{trimmed} {}", self.symbol())
    }
}

impl FromStr for Denomination {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wei" => Ok(Denomination::Wei),
            "gwei" => Ok(Denomination::Gwei),
            "ether" | "eth" => Ok(Denomination::Ether),
            other => bail!("unknown price unit: {other} (expected wei, gwei or ether)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

/// Native-currency balance of an account.
#[derive(Clone, Debug)]
pub struct Balance {
    pub wei: U256,
}

impl Balance {
    pub fn is_empty(&self) -> bool {
        self.wei.is_zero()
    }

    /// Human-readable ETH representation, e.g. `"0.0001 ETH"`.
    ///
    /// Displays exactly 4 decimal places.
    pub fn display_eth(&self) -> String {
        const ETH: u128 = 1_000_000_000_000_000_000; // 1e18

        let whole = self.wei / U256::from(ETH);
        let remainder = self.wei % U256::from(ETH);

        // Scale remainder to 4 decimal digits: remainder * 10_000 / 1e18
        let frac = (remainder * U256::from(10_000u64)) / U256::from(ETH);

        format!("{}.{:04} ETH", whole, frac.to::<u64>())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
