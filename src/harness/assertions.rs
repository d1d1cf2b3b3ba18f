//! Assertions over contract call outcomes.
//!
//! Each returns an `anyhow` error describing the mismatch so a failed
//! scenario reports what was expected and what happened.

use std::fmt::Debug;

use anyhow::{anyhow, bail, Result};

use crate::market::{CallError, CallResult, RevertReason, TxReceipt};

/// The call must revert with exactly `expected`.
pub fn expect_revert<T: Debug>(result: CallResult<T>, expected: RevertReason) -> Result<()> {
    match result {
        Err(CallError::Rejected(actual)) if actual == expected => Ok(()),
        Err(CallError::Rejected(actual)) => {
            bail!("expected revert with {expected}, but it reverted with {actual}")
        }
        Err(other) => bail!("expected revert with {expected}, but the call failed: {other}"),
        Ok(value) => bail!("expected revert with {expected}, but the call succeeded: {value:?}"),
    }
}

/// The call must succeed and its receipt must carry an event named `event`.
pub fn expect_event(result: CallResult<TxReceipt>, event: &str) -> Result<TxReceipt> {
    let receipt = expect_ok(result, &format!("call emitting {event}"))?;
    if !receipt.emitted(event) {
        let seen: Vec<&str> = receipt.events.iter().map(|e| e.name()).collect();
        bail!("expected event {event}, emitted {seen:?}");
    }
    Ok(receipt)
}

/// The call must succeed.
pub fn expect_ok<T>(result: CallResult<T>, what: &str) -> Result<T> {
    result.map_err(|e| anyhow!("{what} failed: {e}"))
}

pub fn expect_eq<T: PartialEq + Debug>(actual: T, expected: T, what: &str) -> Result<()> {
    if actual != expected {
        bail!("{what}: expected {expected:?}, got {actual:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy::primitives::B256;

    use super::*;

    fn receipt() -> TxReceipt {
        TxReceipt {
            tx_hash: B256::ZERO,
            block_number: Some(1),
            events: Vec::new(),
        }
    }

    #[test]
    fn revert_matches_only_the_named_reason() {
        assert!(expect_revert::<()>(
            Err(CallError::rejected(RevertReason::NotOwner)),
            RevertReason::NotOwner
        )
        .is_ok());

        let err = expect_revert::<()>(
            Err(CallError::rejected(RevertReason::NotListed)),
            RevertReason::NotOwner,
        )
        .unwrap_err();
        assert!(err.to_string().contains("NftMarketplace__NotListed"));

        assert!(expect_revert(Ok(1u8), RevertReason::NotOwner).is_err());
        assert!(expect_revert::<()>(
            Err(CallError::Transport("down".to_string())),
            RevertReason::NotOwner
        )
        .is_err());
    }

    #[test]
    fn missing_event_is_reported() {
        let err = expect_event(Ok(receipt()), "ItemBought").unwrap_err();
        assert!(err.to_string().contains("expected event ItemBought"));
    }

    #[test]
    fn equality() {
        assert!(expect_eq(1, 1, "count").is_ok());
        assert_eq!(
            expect_eq(1, 2, "count").unwrap_err().to_string(),
            "count: expected 2, got 1"
        );
    }
}
