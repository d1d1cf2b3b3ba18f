//! In-process development chain.
//!
//! Hosts `NftMarketplace` and `BasicNft` instances with the same observable
//! surface as the deployed contracts: identical check order, revert reasons,
//! events and balance movements. The scenario suite and the integration
//! tests run against it when no node is available.
//!
//! Every transaction executes against a copy of the chain state that is only
//! committed on success, so a revert leaves nothing behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use tracing::debug;

use super::{
    CallError, CallResult, MarketEvent, Marketplace, NftCollection, RevertReason, TxReceipt,
};
use crate::chain::types::{Listing, TokenRef};

/// Balance given to every account passed to [`DevChain::with_accounts`]:
/// 10 000 ETH, as a local Anvil/Hardhat node does.
pub const DEV_ACCOUNT_BALANCE: u128 = 10_000 * 1_000_000_000_000_000_000;

const INVALID_TOKEN_ID: &str = "ERC721: invalid token ID";
const NOT_OWNER_OR_APPROVED: &str = "ERC721: caller is not token owner or approved";
const APPROVE_NOT_OWNER: &str = "ERC721: approve caller is not token owner or approved for all";
const APPROVAL_TO_OWNER: &str = "ERC721: approval to current owner";
const NON_CONTRACT: &str = "function call to a non-contract account";

// ---------------------------------------------------------------------------
// Chain state
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
struct CollectionState {
    token_counter: U256,
    owners: HashMap<U256, Address>,
    approvals: HashMap<U256, Address>,
}

impl CollectionState {
    fn owner_of(&self, token_id: U256) -> Result<Address, RevertReason> {
        self.owners
            .get(&token_id)
            .copied()
            .ok_or_else(|| RevertReason::Other(INVALID_TOKEN_ID.to_string()))
    }

    fn get_approved(&self, token_id: U256) -> Result<Address, RevertReason> {
        self.owner_of(token_id)?;
        Ok(self.approvals.get(&token_id).copied().unwrap_or(Address::ZERO))
    }

    /// `transferFrom` executed by `operator`. Clears the token's approval.
    fn transfer_from(
        &mut self,
        operator: Address,
        from: Address,
        to: Address,
        token_id: U256,
    ) -> Result<(), RevertReason> {
        let owner = self.owner_of(token_id)?;
        let approved = self.approvals.get(&token_id).copied().unwrap_or(Address::ZERO);

        if operator != owner && operator != approved {
            return Err(RevertReason::Other(NOT_OWNER_OR_APPROVED.to_string()));
        }
        if owner != from {
            return Err(RevertReason::Other(
                "ERC721: transfer from incorrect owner".to_string(),
            ));
        }

        self.approvals.remove(&token_id);
        self.owners.insert(token_id, to);
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
struct MarketState {
    listings: HashMap<TokenRef, Listing>,
    proceeds: HashMap<Address, U256>,
}

#[derive(Clone, Debug, Default)]
struct ChainState {
    block_number: u64,
    nonces: HashMap<Address, u64>,
    balances: HashMap<Address, U256>,
    collections: HashMap<Address, CollectionState>,
    markets: HashMap<Address, MarketState>,
}

impl ChainState {
    fn balance(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or(U256::ZERO)
    }

    fn collection(&self, address: Address) -> Result<&CollectionState, RevertReason> {
        self.collections
            .get(&address)
            .ok_or_else(|| RevertReason::Other(NON_CONTRACT.to_string()))
    }

    fn collection_mut(&mut self, address: Address) -> Result<&mut CollectionState, RevertReason> {
        self.collections
            .get_mut(&address)
            .ok_or_else(|| RevertReason::Other(NON_CONTRACT.to_string()))
    }

    fn market(&self, address: Address) -> Result<&MarketState, RevertReason> {
        self.markets
            .get(&address)
            .ok_or_else(|| RevertReason::Other(NON_CONTRACT.to_string()))
    }

    fn market_mut(&mut self, address: Address) -> Result<&mut MarketState, RevertReason> {
        self.markets
            .get_mut(&address)
            .ok_or_else(|| RevertReason::Other(NON_CONTRACT.to_string()))
    }

    /// Consume the sender's next nonce and derive the transaction hash.
    fn next_tx(&mut self, from: Address) -> (u64, B256) {
        let nonce = self.nonces.entry(from).or_insert(0);
        let current = *nonce;
        *nonce += 1;

        let mut preimage = Vec::with_capacity(28);
        preimage.extend_from_slice(from.as_slice());
        preimage.extend_from_slice(&current.to_be_bytes());
        (current, keccak256(&preimage))
    }
}

// ---------------------------------------------------------------------------
// DevChain
// ---------------------------------------------------------------------------

/// Shared handle to an in-process chain. Cloning shares the same state.
#[derive(Clone, Debug, Default)]
pub struct DevChain {
    state: Arc<Mutex<ChainState>>,
}

impl DevChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain where every account in `accounts` holds
    /// [`DEV_ACCOUNT_BALANCE`].
    pub fn with_accounts(accounts: &[Address]) -> Self {
        let chain = Self::new();
        {
            let mut state = chain.state.lock().unwrap_or_else(|e| e.into_inner());
            for account in accounts {
                state.balances.insert(*account, U256::from(DEV_ACCOUNT_BALANCE));
            }
        }
        chain
    }

    fn lock(&self) -> CallResult<MutexGuard<'_, ChainState>> {
        self.state
            .lock()
            .map_err(|_| CallError::Transport("dev chain state lock poisoned".to_string()))
    }

    pub fn block_number(&self) -> CallResult<u64> {
        Ok(self.lock()?.block_number)
    }

    pub fn balance_of(&self, account: Address) -> CallResult<U256> {
        Ok(self.lock()?.balance(account))
    }

    /// Deploy a fresh marketplace from `deployer`; returns its address.
    pub fn deploy_marketplace(&self, deployer: Address) -> CallResult<Address> {
        let mut state = self.lock()?;
        let (nonce, _) = state.next_tx(deployer);
        let address = deployer.create(nonce);
        state.markets.insert(address, MarketState::default());
        state.block_number += 1;

        debug!(%deployer, %address, "dev chain: NftMarketplace deployed");
        Ok(address)
    }

    /// Deploy a fresh BasicNft collection from `deployer`; returns its address.
    pub fn deploy_basic_nft(&self, deployer: Address) -> CallResult<Address> {
        let mut state = self.lock()?;
        let (nonce, _) = state.next_tx(deployer);
        let address = deployer.create(nonce);
        state.collections.insert(address, CollectionState::default());
        state.block_number += 1;

        debug!(%deployer, %address, "dev chain: BasicNft deployed");
        Ok(address)
    }

    /// Connect to the marketplace at `address` as `caller`.
    pub fn marketplace(&self, address: Address, caller: Address) -> DevMarketplace {
        DevMarketplace {
            chain: self.clone(),
            address,
            caller,
        }
    }

    /// Connect to the collection at `address` as `caller`.
    pub fn basic_nft(&self, address: Address, caller: Address) -> DevNft {
        DevNft {
            chain: self.clone(),
            address,
            caller,
        }
    }

    /// Execute one transaction from `from` carrying `value` wei to `to`.
    ///
    /// `apply` runs against a scratch copy of the state; the copy replaces
    /// the live state only if `apply` succeeds.
    fn transact<F>(
        &self,
        from: Address,
        to: Address,
        value: U256,
        apply: F,
    ) -> CallResult<TxReceipt>
    where
        F: FnOnce(&mut ChainState, &mut Vec<MarketEvent>) -> Result<(), RevertReason>,
    {
        let mut state = self.lock()?;

        if state.balance(from) < value {
            return Err(CallError::Transport(
                "insufficient funds for gas * price + value".to_string(),
            ));
        }

        let mut scratch = state.clone();
        let mut events = Vec::new();
        let (_, tx_hash) = scratch.next_tx(from);

        let sender_balance = scratch.balance(from);
        scratch.balances.insert(from, sender_balance - value);
        let recipient_balance = scratch.balance(to);
        scratch.balances.insert(to, recipient_balance + value);

        match apply(&mut scratch, &mut events) {
            Ok(()) => {
                scratch.block_number += 1;
                let block_number = scratch.block_number;
                *state = scratch;

                debug!(
                    %from,
                    %to,
                    %tx_hash,
                    block_number,
                    events = events.len(),
                    "dev chain: tx confirmed"
                );
                Ok(TxReceipt {
                    tx_hash,
                    block_number: Some(block_number),
                    events,
                })
            }
            Err(reason) => {
                debug!(%from, %to, %tx_hash, %reason, "dev chain: tx reverted");
                Err(CallError::Rejected(reason))
            }
        }
    }

    fn view<F, T>(&self, read: F) -> CallResult<T>
    where
        F: FnOnce(&ChainState) -> Result<T, RevertReason>,
    {
        let state = self.lock()?;
        read(&state).map_err(CallError::Rejected)
    }
}

// ---------------------------------------------------------------------------
// Marketplace
// ---------------------------------------------------------------------------

/// Marketplace handle bound to one caller.
#[derive(Clone, Debug)]
pub struct DevMarketplace {
    chain: DevChain,
    address: Address,
    caller: Address,
}

impl DevMarketplace {
    /// The same marketplace, acting as `caller`.
    pub fn connect(&self, caller: Address) -> Self {
        Self {
            caller,
            ..self.clone()
        }
    }
}

/// `isOwner` modifier: the caller must own the token.
fn require_owner(state: &ChainState, token: TokenRef, caller: Address) -> Result<(), RevertReason> {
    let owner = state.collection(token.nft_address)?.owner_of(token.token_id)?;
    if owner != caller {
        return Err(RevertReason::NotOwner);
    }
    Ok(())
}

/// `isListed` modifier: the token must have an active listing.
fn require_listed(market: &MarketState, token: TokenRef) -> Result<Listing, RevertReason> {
    market
        .listings
        .get(&token)
        .cloned()
        .ok_or(RevertReason::NotListed)
}

#[async_trait]
impl Marketplace for DevMarketplace {
    fn address(&self) -> Address {
        self.address
    }

    fn caller(&self) -> Address {
        self.caller
    }

    async fn list_item(&self, token: TokenRef, price: U256) -> CallResult<TxReceipt> {
        let (market_address, caller) = (self.address, self.caller);

        self.chain.transact(caller, market_address, U256::ZERO, |state, events| {
            if state.market(market_address)?.listings.contains_key(&token) {
                return Err(RevertReason::AlreadyListed);
            }
            require_owner(state, token, caller)?;
            if price.is_zero() {
                return Err(RevertReason::PriceMustBeAboveZero);
            }
            let approved = state
                .collection(token.nft_address)?
                .get_approved(token.token_id)?;
            if approved != market_address {
                return Err(RevertReason::NotApprovedForMarketplace);
            }

            state.market_mut(market_address)?.listings.insert(
                token,
                Listing {
                    price,
                    seller: caller,
                },
            );
            events.push(MarketEvent::ItemListed {
                seller: caller,
                token,
                price,
            });
            Ok(())
        })
    }

    async fn buy_item(&self, token: TokenRef, payment: U256) -> CallResult<TxReceipt> {
        let (market_address, caller) = (self.address, self.caller);

        self.chain.transact(caller, market_address, payment, |state, events| {
            let listing = require_listed(state.market(market_address)?, token)?;
            if payment < listing.price {
                return Err(RevertReason::PriceNotMet);
            }

            let market = state.market_mut(market_address)?;
            let credited = market.proceeds.get(&listing.seller).copied().unwrap_or(U256::ZERO);
            market.proceeds.insert(listing.seller, credited + payment);
            market.listings.remove(&token);

            state.collection_mut(token.nft_address)?.transfer_from(
                market_address,
                listing.seller,
                caller,
                token.token_id,
            )?;
            events.push(MarketEvent::Transfer {
                from: listing.seller,
                to: caller,
                token,
            });
            events.push(MarketEvent::ItemBought {
                buyer: caller,
                token,
                price: listing.price,
            });
            Ok(())
        })
    }

    async fn cancel_listing(&self, token: TokenRef) -> CallResult<TxReceipt> {
        let (market_address, caller) = (self.address, self.caller);

        self.chain.transact(caller, market_address, U256::ZERO, |state, events| {
            require_owner(state, token, caller)?;
            require_listed(state.market(market_address)?, token)?;

            state.market_mut(market_address)?.listings.remove(&token);
            events.push(MarketEvent::ItemCancelled {
                seller: caller,
                token,
            });
            Ok(())
        })
    }

    async fn update_listing(&self, token: TokenRef, new_price: U256) -> CallResult<TxReceipt> {
        let (market_address, caller) = (self.address, self.caller);

        self.chain.transact(caller, market_address, U256::ZERO, |state, events| {
            require_listed(state.market(market_address)?, token)?;
            require_owner(state, token, caller)?;
            if new_price.is_zero() {
                return Err(RevertReason::PriceMustBeAboveZero);
            }

            state.market_mut(market_address)?.listings.insert(
                token,
                Listing {
                    price: new_price,
                    seller: caller,
                },
            );
            events.push(MarketEvent::ItemListed {
                seller: caller,
                token,
                price: new_price,
            });
            Ok(())
        })
    }

    async fn withdraw_proceeds(&self) -> CallResult<TxReceipt> {
        let (market_address, caller) = (self.address, self.caller);

        self.chain.transact(caller, market_address, U256::ZERO, |state, _events| {
            let market = state.market_mut(market_address)?;
            let proceeds = market.proceeds.get(&caller).copied().unwrap_or(U256::ZERO);
            if proceeds.is_zero() {
                return Err(RevertReason::NoProceeds);
            }
            market.proceeds.insert(caller, U256::ZERO);

            let escrow = state.balance(market_address);
            if escrow < proceeds {
                return Err(RevertReason::Other("Transfer failed".to_string()));
            }
            state.balances.insert(market_address, escrow - proceeds);
            let balance = state.balance(caller);
            state.balances.insert(caller, balance + proceeds);
            Ok(())
        })
    }

    async fn get_proceeds(&self, seller: Address) -> CallResult<U256> {
        let market_address = self.address;
        self.chain.view(|state| {
            Ok(state
                .market(market_address)?
                .proceeds
                .get(&seller)
                .copied()
                .unwrap_or(U256::ZERO))
        })
    }

    async fn get_listing(&self, token: TokenRef) -> CallResult<Option<Listing>> {
        let market_address = self.address;
        self.chain
            .view(|state| Ok(state.market(market_address)?.listings.get(&token).cloned()))
    }
}

// ---------------------------------------------------------------------------
// BasicNft
// ---------------------------------------------------------------------------

/// BasicNft handle bound to one caller.
#[derive(Clone, Debug)]
pub struct DevNft {
    chain: DevChain,
    address: Address,
    caller: Address,
}

impl DevNft {
    /// The same collection, acting as `caller`.
    pub fn connect(&self, caller: Address) -> Self {
        Self {
            caller,
            ..self.clone()
        }
    }
}

#[async_trait]
impl NftCollection for DevNft {
    fn address(&self) -> Address {
        self.address
    }

    fn caller(&self) -> Address {
        self.caller
    }

    async fn mint_nft(&self) -> CallResult<TxReceipt> {
        let (nft_address, caller) = (self.address, self.caller);

        self.chain.transact(caller, nft_address, U256::ZERO, |state, events| {
            let collection = state.collection_mut(nft_address)?;
            let token_id = collection.token_counter;
            collection.owners.insert(token_id, caller);
            collection.token_counter = token_id + U256::from(1u64);

            events.push(MarketEvent::Transfer {
                from: Address::ZERO,
                to: caller,
                token: TokenRef::new(nft_address, token_id),
            });
            Ok(())
        })
    }

    async fn approve(&self, operator: Address, token_id: U256) -> CallResult<TxReceipt> {
        let (nft_address, caller) = (self.address, self.caller);

        self.chain.transact(caller, nft_address, U256::ZERO, |state, events| {
            let collection = state.collection_mut(nft_address)?;
            let owner = collection.owner_of(token_id)?;
            if operator == owner {
                return Err(RevertReason::Other(APPROVAL_TO_OWNER.to_string()));
            }
            if caller != owner {
                return Err(RevertReason::Other(APPROVE_NOT_OWNER.to_string()));
            }

            collection.approvals.insert(token_id, operator);
            events.push(MarketEvent::Approval {
                owner,
                approved: operator,
                token: TokenRef::new(nft_address, token_id),
            });
            Ok(())
        })
    }

    async fn owner_of(&self, token_id: U256) -> CallResult<Address> {
        let nft_address = self.address;
        self.chain
            .view(|state| state.collection(nft_address)?.owner_of(token_id))
    }

    async fn get_approved(&self, token_id: U256) -> CallResult<Address> {
        let nft_address = self.address;
        self.chain
            .view(|state| state.collection(nft_address)?.get_approved(token_id))
    }

    async fn token_counter(&self) -> CallResult<U256> {
        let nft_address = self.address;
        self.chain
            .view(|state| Ok(state.collection(nft_address)?.token_counter))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
