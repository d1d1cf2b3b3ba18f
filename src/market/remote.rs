//! Live-node backend for the contract proxies.
//!
//! Every state-changing call goes through [`confirm`]: submit, wait for the
//! configured confirmations, check the receipt status and decode its logs.
//! Failures are classified into [`CallError`] so a contract rejection keeps
//! its custom-error name instead of surfacing as an opaque RPC error.

use alloy::contract::Error as ContractError;
use alloy::network::Ethereum;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder};
use alloy::rpc::types::{Log, TransactionReceipt};
use alloy::sol_types::{decode_revert_reason, SolEvent, SolInterface};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{
    CallError, CallResult, MarketEvent, Marketplace, NftCollection, RevertReason, TxReceipt,
};
use crate::chain::client::ConfirmationPolicy;
use crate::chain::contracts::{BasicNft, NftMarketplace};
use crate::chain::types::{Listing, TokenRef};

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Pull a revert reason out of a node's error message.
///
/// Hardhat Network reports custom errors as
/// `reverted with custom error 'NftMarketplace__NotOwner()'` and string
/// reverts as `reverted with reason string 'ERC721: invalid token ID'`.
fn reason_from_message(message: &str) -> Option<RevertReason> {
    const CUSTOM: &str = "custom error '";
    const STRING: &str = "reason string '";

    if let Some(start) = message.find(CUSTOM) {
        let rest = &message[start + CUSTOM.len()..];
        let name = rest.split(['(', '\'']).next()?;
        return Some(RevertReason::from_name(name));
    }

    if let Some(start) = message.find(STRING) {
        let rest = &message[start + STRING.len()..];
        let reason = rest.split('\'').next()?;
        return Some(RevertReason::Other(reason.to_string()));
    }

    None
}

/// Classify a failed contract call.
fn classify(err: ContractError) -> CallError {
    if let Some(data) = err.as_revert_data() {
        if let Ok(decoded) = NftMarketplace::NftMarketplaceErrors::abi_decode(&data) {
            return CallError::Rejected(decoded.into());
        }
        if let Some(reason) = decode_revert_reason(&data) {
            return CallError::Rejected(RevertReason::Other(reason));
        }
        return CallError::Rejected(RevertReason::Other(format!(
            "reverted with data 0x{}",
            hex::encode(&data)
        )));
    }

    let message = err.to_string();
    if let Some(reason) = reason_from_message(&message) {
        return CallError::Rejected(reason);
    }

    // Undecodable answers and binding mismatches: the call reached the node.
    CallError::Transport(message)
}

/// Decode every marketplace and ERC-721 event in `logs`. Unknown logs are
/// skipped.
fn decode_events(logs: &[Log]) -> Vec<MarketEvent> {
    logs.iter().filter_map(decode_event).collect()
}

fn decode_event(log: &Log) -> Option<MarketEvent> {
    let emitter = log.inner.address;
    let topic0 = *log.topic0()?;

    if topic0 == NftMarketplace::NftMarketplace__ItemListed::SIGNATURE_HASH {
        let event = log.log_decode::<NftMarketplace::NftMarketplace__ItemListed>().ok()?.inner.data;
        return Some(MarketEvent::ItemListed {
            seller: event.seller,
            token: TokenRef::new(event.nftAddress, event.tokenId),
            price: event.price,
        });
    }

    if topic0 == NftMarketplace::ItemBought::SIGNATURE_HASH {
        let event = log.log_decode::<NftMarketplace::ItemBought>().ok()?.inner.data;
        return Some(MarketEvent::ItemBought {
            buyer: event.buyer,
            token: TokenRef::new(event.nftAddress, event.tokenId),
            price: event.price,
        });
    }

    if topic0 == NftMarketplace::NftMarketplace__ItemCancelled::SIGNATURE_HASH {
        let event = log
            .log_decode::<NftMarketplace::NftMarketplace__ItemCancelled>()
            .ok()?
            .inner
            .data;
        return Some(MarketEvent::ItemCancelled {
            seller: event.seller,
            token: TokenRef::new(event.nftAddress, event.tokenId),
        });
    }

    // ERC-20 Transfer shares this topic but has one fewer indexed field, so
    // its decode fails and the log is skipped.
    if topic0 == BasicNft::Transfer::SIGNATURE_HASH {
        let event = log.log_decode::<BasicNft::Transfer>().ok()?.inner.data;
        return Some(MarketEvent::Transfer {
            from: event.from,
            to: event.to,
            token: TokenRef::new(emitter, event.tokenId),
        });
    }

    if topic0 == BasicNft::Approval::SIGNATURE_HASH {
        let event = log.log_decode::<BasicNft::Approval>().ok()?.inner.data;
        return Some(MarketEvent::Approval {
            owner: event.owner,
            approved: event.approved,
            token: TokenRef::new(emitter, event.tokenId),
        });
    }

    None
}

/// Await a submitted call to confirmation and turn its receipt into a
/// [`TxReceipt`].
async fn confirm(
    submitted: Result<PendingTransactionBuilder<Ethereum>, ContractError>,
    policy: &ConfirmationPolicy,
) -> CallResult<TxReceipt> {
    let pending = submitted.map_err(classify)?;
    let tx_hash = *pending.tx_hash();
    debug!(%tx_hash, confirmations = policy.confirmations, "transaction submitted");

    let receipt: TransactionReceipt = pending
        .with_required_confirmations(policy.confirmations)
        .with_timeout(Some(policy.timeout))
        .get_receipt()
        .await
        .map_err(|e| CallError::Confirmation(format!("{tx_hash}: {e}")))?;

    if !receipt.status() {
        warn!(%tx_hash, "transaction mined but reverted");
        return Err(CallError::Confirmation(format!(
            "{tx_hash}: transaction reverted on-chain without a decodable reason"
        )));
    }

    let events = decode_events(receipt.inner.logs());
    debug!(%tx_hash, block = ?receipt.block_number, events = events.len(), "transaction confirmed");

    Ok(TxReceipt {
        tx_hash,
        block_number: receipt.block_number,
        events,
    })
}

// ---------------------------------------------------------------------------
// RemoteMarketplace
// ---------------------------------------------------------------------------

/// Marketplace proxy backed by a live node.
pub struct RemoteMarketplace {
    contract: NftMarketplace::NftMarketplaceInstance<DynProvider>,
    caller: Address,
    policy: ConfirmationPolicy,
}

impl RemoteMarketplace {
    /// `provider` must sign as `caller`.
    pub fn new(
        address: Address,
        provider: DynProvider,
        caller: Address,
        policy: ConfirmationPolicy,
    ) -> Self {
        Self {
            contract: NftMarketplace::new(address, provider),
            caller,
            policy,
        }
    }
}

#[async_trait]
impl Marketplace for RemoteMarketplace {
    fn address(&self) -> Address {
        *self.contract.address()
    }

    fn caller(&self) -> Address {
        self.caller
    }

    async fn list_item(&self, token: TokenRef, price: U256) -> CallResult<TxReceipt> {
        debug!(%token, %price, caller = %self.caller, "listItem");
        let call = self.contract.listItem(token.nft_address, token.token_id, price);
        confirm(call.send().await, &self.policy).await
    }

    async fn buy_item(&self, token: TokenRef, payment: U256) -> CallResult<TxReceipt> {
        debug!(%token, %payment, caller = %self.caller, "buyItem");
        let call = self
            .contract
            .buyItem(token.nft_address, token.token_id)
            .value(payment);
        confirm(call.send().await, &self.policy).await
    }

    async fn cancel_listing(&self, token: TokenRef) -> CallResult<TxReceipt> {
        debug!(%token, caller = %self.caller, "cancelListing");
        let call = self.contract.cancelListing(token.nft_address, token.token_id);
        confirm(call.send().await, &self.policy).await
    }

    async fn update_listing(&self, token: TokenRef, new_price: U256) -> CallResult<TxReceipt> {
        debug!(%token, %new_price, caller = %self.caller, "updateListing");
        let call = self
            .contract
            .updateListing(token.nft_address, token.token_id, new_price);
        confirm(call.send().await, &self.policy).await
    }

    async fn withdraw_proceeds(&self) -> CallResult<TxReceipt> {
        debug!(caller = %self.caller, "withdrawProceeds");
        let call = self.contract.withdrawProceeds();
        confirm(call.send().await, &self.policy).await
    }

    async fn get_proceeds(&self, seller: Address) -> CallResult<U256> {
        self.contract
            .getProceeds(seller)
            .call()
            .await
            .map_err(classify)
    }

    async fn get_listing(&self, token: TokenRef) -> CallResult<Option<Listing>> {
        let raw = self
            .contract
            .getListing(token.nft_address, token.token_id)
            .call()
            .await
            .map_err(classify)?;

        Ok(Listing::from_raw(raw.price, raw.seller))
    }
}

// ---------------------------------------------------------------------------
// RemoteNft
// ---------------------------------------------------------------------------

/// BasicNft proxy backed by a live node.
pub struct RemoteNft {
    contract: BasicNft::BasicNftInstance<DynProvider>,
    caller: Address,
    policy: ConfirmationPolicy,
}

impl RemoteNft {
    /// `provider` must sign as `caller`.
    pub fn new(
        address: Address,
        provider: DynProvider,
        caller: Address,
        policy: ConfirmationPolicy,
    ) -> Self {
        Self {
            contract: BasicNft::new(address, provider),
            caller,
            policy,
        }
    }
}

#[async_trait]
impl NftCollection for RemoteNft {
    fn address(&self) -> Address {
        *self.contract.address()
    }

    fn caller(&self) -> Address {
        self.caller
    }

    async fn mint_nft(&self) -> CallResult<TxReceipt> {
        debug!(caller = %self.caller, "mintNft");
        let call = self.contract.mintNft();
        confirm(call.send().await, &self.policy).await
    }

    async fn approve(&self, operator: Address, token_id: U256) -> CallResult<TxReceipt> {
        debug!(%operator, %token_id, caller = %self.caller, "approve");
        let call = self.contract.approve(operator, token_id);
        confirm(call.send().await, &self.policy).await
    }

    async fn owner_of(&self, token_id: U256) -> CallResult<Address> {
        self.contract
            .ownerOf(token_id)
            .call()
            .await
            .map_err(classify)
    }

    async fn get_approved(&self, token_id: U256) -> CallResult<Address> {
        self.contract
            .getApproved(token_id)
            .call()
            .await
            .map_err(classify)
    }

    async fn token_counter(&self) -> CallResult<U256> {
        self.contract
            .getTokenCounter()
            .call()
            .await
            .map_err(classify)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, LogData, B256};

    // -- reason_from_message ----------------------------------------------

    #[test]
    fn hardhat_custom_error_message() {
        let msg = "VM Exception while processing transaction: \
                   reverted with custom error 'NftMarketplace__NotOwner()'";
        assert_eq!(reason_from_message(msg), Some(RevertReason::NotOwner));
    }

    #[test]
    fn hardhat_custom_error_with_arguments() {
        let msg = "reverted with custom error 'NftMarketplace__PriceNotMet(\
                   \"0x5FbDB2315678afecb367f032d93F642f64180aa3\", 0, 1)'";
        assert_eq!(reason_from_message(msg), Some(RevertReason::PriceNotMet));
    }

    #[test]
    fn hardhat_reason_string_message() {
        let msg = "reverted with reason string 'ERC721: invalid token ID'";
        assert_eq!(
            reason_from_message(msg),
            Some(RevertReason::Other("ERC721: invalid token ID".to_string()))
        );
    }

    #[test]
    fn unrelated_message_has_no_reason() {
        assert_eq!(reason_from_message("connection refused"), None);
    }

    // -- classify -----------------------------------------------------------

    #[test]
    fn binding_mismatch_is_not_a_local_error() {
        let err = classify(ContractError::UnknownFunction("getListing".to_string()));
        assert!(matches!(err, CallError::Transport(_)), "got {err:?}");
    }

    #[test]
    fn hardhat_message_is_a_rejection() {
        let err = classify(ContractError::UnknownFunction(
            "reverted with custom error 'NftMarketplace__NoProceeds()'".to_string(),
        ));
        assert_eq!(err, CallError::Rejected(RevertReason::NoProceeds));
    }

    // -- decode_events ----------------------------------------------------

    fn rpc_log(address: Address, data: LogData) -> Log {
        Log {
            inner: alloy::primitives::Log { address, data },
            ..Default::default()
        }
    }

    #[test]
    fn decodes_item_bought() {
        let market = Address::repeat_byte(0x01);
        let event = NftMarketplace::ItemBought {
            buyer: Address::repeat_byte(0x02),
            nftAddress: Address::repeat_byte(0x03),
            tokenId: U256::from(0u64),
            price: U256::from(1u64),
        };
        let log = rpc_log(market, event.encode_log_data());

        let events = decode_events(&[log]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "ItemBought");
        match &events[0] {
            MarketEvent::ItemBought { buyer, token, price } => {
                assert_eq!(*buyer, Address::repeat_byte(0x02));
                assert_eq!(token.nft_address, Address::repeat_byte(0x03));
                assert_eq!(*price, U256::from(1u64));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn mint_transfer_uses_emitter_as_collection() {
        let nft = Address::repeat_byte(0x0a);
        let event = BasicNft::Transfer {
            from: Address::ZERO,
            to: Address::repeat_byte(0x02),
            tokenId: U256::from(4u64),
        };
        let log = rpc_log(nft, event.encode_log_data());

        let events = decode_events(&[log]);
        assert_eq!(
            events,
            vec![MarketEvent::Transfer {
                from: Address::ZERO,
                to: Address::repeat_byte(0x02),
                token: TokenRef::new(nft, U256::from(4u64)),
            }]
        );
    }

    #[test]
    fn unknown_logs_are_skipped() {
        let log = rpc_log(
            Address::ZERO,
            LogData::new_unchecked(vec![B256::repeat_byte(0xff)], Bytes::new()),
        );
        assert!(decode_events(&[log]).is_empty());
    }
}
