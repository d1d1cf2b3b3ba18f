//! User-facing output.
//!
//! Every command prints through these helpers so that `--json` switches the
//! whole CLI to machine-readable output in one place.

use std::sync::atomic::{AtomicBool, Ordering};

use alloy::primitives::{Address, U256};
use anyhow::Error;
use serde::Serialize;

use crate::chain::types::{Denomination, Listing, TokenRef};
use crate::harness::scenarios::{Outcome, SuiteReport};
use crate::market::{CallError, RevertReason, TxReceipt};

// ---------------------------------------------------------------------------
// JSON mode
// ---------------------------------------------------------------------------

static JSON_MODE: AtomicBool = AtomicBool::new(false);

/// Enable or disable JSON output mode globally.
pub fn set_json_mode(enabled: bool) {
    JSON_MODE.store(enabled, Ordering::Relaxed);
}

pub fn is_json_mode() -> bool {
    JSON_MODE.load(Ordering::Relaxed)
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("{}", serde_json::json!({ "error": e.to_string() })),
    }
}

// ---------------------------------------------------------------------------
// Success / info / warning primitives
// ---------------------------------------------------------------------------

/// Print a success message to stdout: "✓ {msg}"
pub fn print_success(msg: &str) {
    if !is_json_mode() {
        println!("\u{2713} {msg}");
    }
}

/// Print an informational line. Suppressed in JSON mode.
pub fn print_info(msg: &str) {
    if !is_json_mode() {
        println!("{msg}");
    }
}

/// Print a warning to stderr: "⚠ {msg}"
pub fn print_warning(msg: &str) {
    eprintln!("\u{26A0} {msg}");
}

// ---------------------------------------------------------------------------
// Error formatting
// ---------------------------------------------------------------------------

fn describe_revert(reason: &RevertReason) -> String {
    let plain = match reason {
        RevertReason::NotOwner => "Only the token owner can do that.",
        RevertReason::NotApprovedForMarketplace => {
            "The marketplace is not approved for this token. Approve it first."
        }
        RevertReason::PriceMustBeAboveZero => "The price must be above zero.",
        RevertReason::AlreadyListed => "This token is already listed.",
        RevertReason::NotListed => "This token is not listed.",
        RevertReason::PriceNotMet => "The payment does not cover the listing price.",
        RevertReason::NoProceeds => "There are no proceeds to withdraw.",
        RevertReason::Other(reason) => return format!("The contract rejected the call: {reason}"),
    };
    format!("{plain} ({})", reason.as_str())
}

/// Translate an error into a one-line message for the user.
///
/// Contract rejections keep their literal reason name; other failures are
/// matched by message, most specific first.
pub fn format_error(err: &Error) -> String {
    if let Some(call_err) = err.downcast_ref::<CallError>() {
        match call_err {
            CallError::Rejected(reason) => return describe_revert(reason),
            CallError::Confirmation(detail) => {
                return format!("The transaction was not confirmed: {detail}")
            }
            CallError::Local(_) | CallError::Transport(_) => {}
        }
    }

    let msg = format!("{err:#}");
    let lower = msg.to_lowercase();

    if lower.contains("insufficient funds") {
        "Insufficient funds. Run `nftmarket accounts` to check balances.".to_string()
    } else if lower.contains("nonce") {
        "Transaction conflict. Please try again.".to_string()
    } else if lower.contains("timeout") || lower.contains("connection") {
        "Network unreachable. Check the RPC endpoint and your connection.".to_string()
    } else if lower.contains("not deployed") {
        format!("{}", err.root_cause())
    } else if lower.contains("negative") {
        "Amounts must not be negative.".to_string()
    } else if lower.contains("no private key") {
        format!("{}", err.root_cause())
    } else if lower.contains("parse") || lower.contains("invalid") {
        format!("Invalid input: {msg}")
    } else {
        format!("Operation failed: {msg}")
    }
}

/// Format and print an error to stderr.
///
/// In JSON mode, emits `{"error": "..."}` instead of plain text.
pub fn print_error(err: &Error) {
    let message = format_error(err);
    if is_json_mode() {
        let reason = err
            .downcast_ref::<CallError>()
            .and_then(CallError::revert_reason)
            .map(|r| r.as_str().to_string());
        eprintln!("{}", serde_json::json!({ "error": message, "reason": reason }));
    } else {
        eprintln!("{message}");
    }
}

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

/// Print the receipt of a confirmed call.
pub fn print_receipt(action: &str, receipt: &TxReceipt) {
    if is_json_mode() {
        print_json(receipt);
        return;
    }

    print_success(action);
    println!("Tx:     {}", receipt.tx_hash);
    if let Some(block) = receipt.block_number {
        println!("Block:  {block}");
    }
    for event in &receipt.events {
        println!("Event:  {event}");
    }
}

pub fn print_listing(token: &TokenRef, listing: Option<&Listing>, unit: Denomination) {
    if is_json_mode() {
        print_json(&serde_json::json!({ "token": token, "listing": listing }));
        return;
    }

    match listing {
        Some(listing) => {
            println!("Token:  {token}");
            println!("Seller: {}", listing.seller);
            println!("Price:  {}", unit.format_amount(listing.price));
        }
        None => println!("{token} is not listed."),
    }
}

pub fn print_amount(label: &str, address: Address, wei: U256, unit: Denomination) {
    if is_json_mode() {
        print_json(&serde_json::json!({
            "address": address,
            "kind": label,
            "wei": wei.to_string(),
        }));
    } else {
        println!("{label} of {address}: {}", unit.format_amount(wei));
    }
}

/// Print rows of (name, address, balance) as an aligned table.
pub fn print_accounts(rows: &[(String, Address, String)]) {
    if is_json_mode() {
        let json: Vec<_> = rows
            .iter()
            .map(|(name, address, balance)| {
                serde_json::json!({ "account": name, "address": address, "balance": balance })
            })
            .collect();
        print_json(&json);
        return;
    }

    let name_width = rows.iter().map(|(name, _, _)| name.len()).max().unwrap_or(7).max(7);

    println!("{:<width$}  {:<42}  Balance", "Account", "Address", width = name_width);
    for (name, address, balance) in rows {
        println!("{:<width$}  {address}  {balance}", name, width = name_width);
    }
}

/// Print the scenario suite results, mocha style.
pub fn print_suite_report(report: &SuiteReport) {
    if is_json_mode() {
        print_json(report);
        return;
    }

    println!("Network: {}", report.network);
    let mut group = "";
    for result in &report.results {
        if result.group != group {
            group = result.group;
            println!();
            println!("  {group}");
        }
        match &result.outcome {
            Outcome::Passed => println!("    \u{2713} {}", result.description),
            Outcome::Failed(detail) => {
                println!("    \u{2717} {}", result.description);
                println!("        {detail}");
            }
            Outcome::Skipped(_) => println!("    - {} (skipped)", result.description),
        }
    }

    println!();
    println!(
        "  {} passing, {} failing, {} skipped",
        report.passed(),
        report.failed(),
        report.skipped()
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn rejection_keeps_literal_reason() {
        let err: Error = CallError::rejected(RevertReason::NotApprovedForMarketplace).into();
        let msg = format_error(&err);
        assert!(msg.starts_with("The marketplace is not approved"));
        assert!(msg.ends_with("(NftMarketplace__NotApprovedForMarketplace)"));
    }

    #[test]
    fn rejection_found_through_context() {
        let err = Err::<(), _>(CallError::rejected(RevertReason::PriceNotMet))
            .context("buying failed")
            .unwrap_err();
        assert_eq!(
            format_error(&err),
            "The payment does not cover the listing price. (NftMarketplace__PriceNotMet)"
        );
    }

    #[test]
    fn other_revert_is_shown_verbatim() {
        let err: Error =
            CallError::rejected(RevertReason::Other("ERC721: invalid token ID".into())).into();
        assert_eq!(
            format_error(&err),
            "The contract rejected the call: ERC721: invalid token ID"
        );
    }

    #[test]
    fn insufficient_funds() {
        let err: Error =
            CallError::Transport("insufficient funds for gas * price + value".into()).into();
        assert_eq!(
            format_error(&err),
            "Insufficient funds. Run `nftmarket accounts` to check balances."
        );
    }

    #[test]
    fn timeout_and_connection() {
        for msg in ["request timeout after 30s", "connection refused"] {
            assert_eq!(
                format_error(&anyhow!(msg)),
                "Network unreachable. Check the RPC endpoint and your connection."
            );
        }
    }

    #[test]
    fn negative_amount() {
        let err = anyhow!("amount must not be negative: -1");
        assert_eq!(format_error(&err), "Amounts must not be negative.");
    }

    #[test]
    fn missing_deployment_shows_root_cause() {
        let err = anyhow!(
            "NftMarketplace is not deployed on localhost; run `nftmarket deploy` first"
        )
        .context("resolving contracts");
        assert_eq!(
            format_error(&err),
            "NftMarketplace is not deployed on localhost; run `nftmarket deploy` first"
        );
    }

    #[test]
    fn fallback() {
        let err = anyhow!("something unexpected");
        assert_eq!(format_error(&err), "Operation failed: something unexpected");
    }

    #[test]
    fn json_mode_toggle() {
        set_json_mode(true);
        assert!(is_json_mode());
        set_json_mode(false);
        assert!(!is_json_mode());
    }
}
