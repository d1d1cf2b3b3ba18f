//! Client-side proxy for the marketplace and token contracts.
//!
//! [`Marketplace`] and [`NftCollection`] describe the remote call surface.
//! Each handle is bound to one caller identity, mirroring
//! `contract.connect(signer)`: to act as another account, connect another
//! handle. Two backends implement the traits:
//!
//! - [`remote`]: alloy bindings against a live node.
//! - [`devchain`]: an in-process chain with the same observable behavior.
//!
//! Calls are sequential. State-changing calls resolve once the transaction
//! is confirmed and yield a [`TxReceipt`] with every decoded event.

use std::fmt;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::Serialize;

use crate::chain::types::{Listing, TokenRef};

pub mod devchain;
pub mod error;
pub mod remote;

pub use error::{CallError, CallResult, RevertReason};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// An event decoded from a confirmed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MarketEvent {
    ItemListed {
        seller: Address,
        token: TokenRef,
        price: U256,
    },
    ItemBought {
        buyer: Address,
        token: TokenRef,
        price: U256,
    },
    ItemCancelled {
        seller: Address,
        token: TokenRef,
    },
    /// ERC-721 `Transfer`; `from == 0` for a mint.
    Transfer {
        from: Address,
        to: Address,
        token: TokenRef,
    },
    /// ERC-721 `Approval`.
    Approval {
        owner: Address,
        approved: Address,
        token: TokenRef,
    },
}

impl MarketEvent {
    /// Event name exactly as declared by the emitting contract.
    pub fn name(&self) -> &'static str {
        match self {
            MarketEvent::ItemListed { .. } => "NftMarketplace__ItemListed",
            MarketEvent::ItemBought { .. } => "ItemBought",
            MarketEvent::ItemCancelled { .. } => "NftMarketplace__ItemCancelled",
            MarketEvent::Transfer { .. } => "Transfer",
            MarketEvent::Approval { .. } => "Approval",
        }
    }
}

impl fmt::Display for MarketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketEvent::ItemListed { token, price, .. } => {
                write!(f, "{}({token}, price {price})", self.name())
            }
            MarketEvent::ItemBought { buyer, token, .. } => {
                write!(f, "{}({token}, buyer {buyer})", self.name())
            }
            MarketEvent::ItemCancelled { token, .. } => write!(f, "{}({token})", self.name()),
            MarketEvent::Transfer { from, to, token } => {
                write!(f, "{}({token}, {from} -> {to})", self.name())
            }
            MarketEvent::Approval { approved, token, .. } => {
                write!(f, "{}({token}, approved {approved})", self.name())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Outcome of a confirmed state-changing call.
#[derive(Clone, Debug, Serialize)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub events: Vec<MarketEvent>,
}

impl TxReceipt {
    /// `true` if an event with this contract-level name was emitted.
    pub fn emitted(&self, name: &str) -> bool {
        self.events.iter().any(|event| event.name() == name)
    }

    /// Token id of the first mint (`Transfer` from the zero address).
    pub fn minted_token_id(&self) -> Option<U256> {
        self.events.iter().find_map(|event| match event {
            MarketEvent::Transfer { from, token, .. } if from.is_zero() => Some(token.token_id),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Contract proxies
// ---------------------------------------------------------------------------

/// The marketplace contract, as seen by one caller.
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Address of the marketplace contract.
    fn address(&self) -> Address;

    /// Account this handle submits calls as.
    fn caller(&self) -> Address;

    async fn list_item(&self, token: TokenRef, price: U256) -> CallResult<TxReceipt>;

    /// Buy a listed token, sending `payment` wei along with the call.
    async fn buy_item(&self, token: TokenRef, payment: U256) -> CallResult<TxReceipt>;

    async fn cancel_listing(&self, token: TokenRef) -> CallResult<TxReceipt>;

    async fn update_listing(&self, token: TokenRef, new_price: U256) -> CallResult<TxReceipt>;

    async fn withdraw_proceeds(&self) -> CallResult<TxReceipt>;

    async fn get_proceeds(&self, seller: Address) -> CallResult<U256>;

    /// `None` when the token has no active listing.
    async fn get_listing(&self, token: TokenRef) -> CallResult<Option<Listing>>;
}

/// The ERC-721 collection the marketplace trades, as seen by one caller.
#[async_trait]
pub trait NftCollection: Send + Sync {
    fn address(&self) -> Address;

    fn caller(&self) -> Address;

    /// Mint the next token to the caller. The receipt carries the `Transfer`
    /// event holding the new id (see [`TxReceipt::minted_token_id`]).
    async fn mint_nft(&self) -> CallResult<TxReceipt>;

    async fn approve(&self, operator: Address, token_id: U256) -> CallResult<TxReceipt>;

    async fn owner_of(&self, token_id: U256) -> CallResult<Address>;

    async fn get_approved(&self, token_id: U256) -> CallResult<Address>;

    async fn token_counter(&self) -> CallResult<U256>;

    /// Reference to `token_id` in this collection.
    fn token(&self, token_id: U256) -> TokenRef {
        TokenRef::new(self.address(), token_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
