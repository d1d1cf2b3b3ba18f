//! Tagged failure values for marketplace and token calls.
//!
//! Every proxy call returns [`CallResult`]. A contract rejection keeps the
//! contract's own reason so callers and tests can match on it; transport and
//! confirmation problems are kept apart from rejections.

use std::fmt;

use thiserror::Error;

use crate::chain::contracts::NftMarketplace::NftMarketplaceErrors;

pub type CallResult<T> = std::result::Result<T, CallError>;

/// Why a contract rejected a call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevertReason {
    NotOwner,
    NotApprovedForMarketplace,
    PriceMustBeAboveZero,
    AlreadyListed,
    NotListed,
    PriceNotMet,
    NoProceeds,
    /// Any other revert string, e.g. an ERC-721 error from the token contract.
    Other(String),
}

impl RevertReason {
    /// The literal custom-error name the contract reverts with.
    pub fn as_str(&self) -> &str {
        match self {
            RevertReason::NotOwner => "NftMarketplace__NotOwner",
            RevertReason::NotApprovedForMarketplace => "NftMarketplace__NotApprovedForMarketplace",
            RevertReason::PriceMustBeAboveZero => "NftMarketplace__PriceMustBeAboveZero",
            RevertReason::AlreadyListed => "NftMarketplace__AlreadyListed",
            RevertReason::NotListed => "NftMarketplace__NotListed",
            RevertReason::PriceNotMet => "NftMarketplace__PriceNotMet",
            RevertReason::NoProceeds => "NftMarketplace__NoProceeds",
            RevertReason::Other(reason) => reason,
        }
    }

    /// Parse a reason from its literal name. Unknown names become `Other`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "NftMarketplace__NotOwner" => RevertReason::NotOwner,
            "NftMarketplace__NotApprovedForMarketplace" => RevertReason::NotApprovedForMarketplace,
            "NftMarketplace__PriceMustBeAboveZero" => RevertReason::PriceMustBeAboveZero,
            "NftMarketplace__AlreadyListed" => RevertReason::AlreadyListed,
            "NftMarketplace__NotListed" => RevertReason::NotListed,
            "NftMarketplace__PriceNotMet" => RevertReason::PriceNotMet,
            "NftMarketplace__NoProceeds" => RevertReason::NoProceeds,
            other => RevertReason::Other(other.to_string()),
        }
    }
}

impl From<NftMarketplaceErrors> for RevertReason {
    fn from(err: NftMarketplaceErrors) -> Self {
        match err {
            NftMarketplaceErrors::NftMarketplace__NotOwner(_) => RevertReason::NotOwner,
            NftMarketplaceErrors::NftMarketplace__NotApprovedForMarketplace(_) => {
                RevertReason::NotApprovedForMarketplace
            }
            NftMarketplaceErrors::NftMarketplace__PriceMustBeAboveZero(_) => {
                RevertReason::PriceMustBeAboveZero
            }
            NftMarketplaceErrors::NftMarketplace__AlreadyListed(_) => RevertReason::AlreadyListed,
            NftMarketplaceErrors::NftMarketplace__NotListed(_) => RevertReason::NotListed,
            NftMarketplaceErrors::NftMarketplace__PriceNotMet(_) => RevertReason::PriceNotMet,
            NftMarketplaceErrors::NftMarketplace__NoProceeds(_) => RevertReason::NoProceeds,
        }
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed marketplace or token call.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CallError {
    /// Rejected locally before anything was submitted.
    #[error("invalid input: {0}")]
    Local(String),

    /// The contract aborted the call.
    #[error("reverted with {0}")]
    Rejected(RevertReason),

    /// Submitted, but waiting for the receipt failed or timed out.
    #[error("confirmation failed: {0}")]
    Confirmation(String),

    /// The node could not be reached or answered with a non-revert error.
    #[error("transport error: {0}")]
    Transport(String),
}

impl CallError {
    pub fn rejected(reason: RevertReason) -> Self {
        CallError::Rejected(reason)
    }

    /// The revert reason, if this is a contract rejection.
    pub fn revert_reason(&self) -> Option<&RevertReason> {
        match self {
            CallError::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    /// `true` if the contract rejected the call with exactly `reason`.
    pub fn is_revert(&self, reason: &RevertReason) -> bool {
        self.revert_reason() == Some(reason)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::contracts::NftMarketplace;

    const ALL: [RevertReason; 7] = [
        RevertReason::NotOwner,
        RevertReason::NotApprovedForMarketplace,
        RevertReason::PriceMustBeAboveZero,
        RevertReason::AlreadyListed,
        RevertReason::NotListed,
        RevertReason::PriceNotMet,
        RevertReason::NoProceeds,
    ];

    #[test]
    fn names_are_prefixed_custom_errors() {
        for reason in ALL {
            assert!(reason.as_str().starts_with("NftMarketplace__"), "{reason}");
            assert_eq!(RevertReason::from_name(reason.as_str()), reason);
        }
    }

    #[test]
    fn unknown_name_is_other() {
        let reason = RevertReason::from_name("ERC721: invalid token ID");
        assert_eq!(reason, RevertReason::Other("ERC721: invalid token ID".to_string()));
        assert_eq!(reason.as_str(), "ERC721: invalid token ID");
    }

    #[test]
    fn decoded_interface_error_maps_to_reason() {
        let err = NftMarketplaceErrors::NftMarketplace__NoProceeds(
            NftMarketplace::NftMarketplace__NoProceeds {},
        );
        assert_eq!(RevertReason::from(err), RevertReason::NoProceeds);
    }

    #[test]
    fn call_error_display_carries_reason() {
        let err = CallError::rejected(RevertReason::PriceNotMet);
        assert_eq!(err.to_string(), "reverted with NftMarketplace__PriceNotMet");
        assert!(err.is_revert(&RevertReason::PriceNotMet));
        assert!(!err.is_revert(&RevertReason::NotListed));
    }

    #[test]
    fn confirmation_failure_is_not_a_revert() {
        let err = CallError::Confirmation("timed out after 60s".to_string());
        assert_eq!(err.revert_reason(), None);
    }

    #[test]
    fn call_error_converts_into_anyhow_and_back() {
        let err: anyhow::Error = CallError::rejected(RevertReason::NotOwner).into();
        let back = err.downcast_ref::<CallError>().unwrap();
        assert!(back.is_revert(&RevertReason::NotOwner));
    }
}
