//! Token ledger: per-account loyalty balance.
//!
//! One token is worth one rupee at booking time. Balances only move when a
//! payment is confirmed ([`settle`]), guarded by the booking's
//! `tokens_settled` flag so a confirmation delivered twice moves them once.

use crate::config::BookingPolicy;
use crate::error::TokenLedgerError;
use crate::metrics;
use crate::store::{StoreTx, TokenChange};
use crate::types::{AccountId, BookingId, Money, TokenReason};

/// Tokens earned for actually paying `paid`, rounded down.
///
/// With the default policy: 10 tokens per ₹500.
///
/// ```
/// use eventhub::config::BookingPolicy;
/// use eventhub::tokens::earned_for;
/// use eventhub::types::Money;
///
/// let policy = BookingPolicy::default();
/// assert_eq!(earned_for(Money::from_paise(50_000), &policy), 10);
/// assert_eq!(earned_for(Money::ZERO, &policy), 0);
/// ```
#[must_use]
pub fn earned_for(paid: Money, policy: &BookingPolicy) -> u64 {
    let unit = policy.earn_unit.paise().max(1);
    let earned = u128::from(paid.paise()) * u128::from(policy.tokens_per_earn_unit) / u128::from(unit);
    u64::try_from(earned).unwrap_or(u64::MAX)
}

/// Price after redeeming `tokens` (one rupee each), floored at zero.
#[must_use]
pub fn discounted(total: Money, tokens: u64) -> Money {
    let discount = Money::from_paise(tokens.saturating_mul(Money::MINOR_PER_MAJOR));
    total.saturating_sub(discount)
}

/// Check that `amount` tokens can be redeemed from `balance`. Mutates nothing.
///
/// # Errors
///
/// [`TokenLedgerError::InsufficientTokens`] if `amount > balance`.
pub fn reserve_for_discount(balance: u64, amount: u64) -> Result<(), TokenLedgerError> {
    if amount > balance {
        return Err(TokenLedgerError::InsufficientTokens {
            requested: amount,
            balance,
        });
    }
    Ok(())
}

/// Current balance.
///
/// # Errors
///
/// [`TokenLedgerError::AccountNotFound`] or storage failures.
pub async fn balance<T: StoreTx>(tx: &mut T, account: AccountId) -> Result<u64, TokenLedgerError> {
    tx.account(account)
        .await?
        .map(|a| a.tokens)
        .ok_or(TokenLedgerError::AccountNotFound)
}

/// Remove `amount` tokens; the balance never drops below zero.
///
/// # Errors
///
/// [`TokenLedgerError::AccountNotFound`] or storage failures.
pub async fn debit<T: StoreTx>(
    tx: &mut T,
    account: AccountId,
    amount: u64,
    booking: Option<BookingId>,
) -> Result<u64, TokenLedgerError> {
    adjust(tx, account, amount, false, TokenReason::Spent, booking).await
}

/// Add `amount` tokens.
///
/// # Errors
///
/// [`TokenLedgerError::AccountNotFound`] or storage failures.
pub async fn credit<T: StoreTx>(
    tx: &mut T,
    account: AccountId,
    amount: u64,
    reason: TokenReason,
    booking: Option<BookingId>,
) -> Result<u64, TokenLedgerError> {
    adjust(tx, account, amount, true, reason, booking).await
}

/// Apply the debit of redeemed tokens and the credit of earned tokens for a
/// confirmed payment. Zero amounts are skipped.
///
/// # Errors
///
/// [`TokenLedgerError::AccountNotFound`] or storage failures.
pub async fn settle<T: StoreTx>(
    tx: &mut T,
    account: AccountId,
    booking: BookingId,
    spent: u64,
    earned: u64,
) -> Result<(), TokenLedgerError> {
    if spent > 0 {
        debit(tx, account, spent, Some(booking)).await?;
        metrics::record_tokens("spent", spent);
    }
    if earned > 0 {
        credit(tx, account, earned, TokenReason::Earned, Some(booking)).await?;
        metrics::record_tokens("earned", earned);
    }
    tracing::info!(account_id = %account, booking_id = %booking, spent, earned, "Tokens settled");
    Ok(())
}

async fn adjust<T: StoreTx>(
    tx: &mut T,
    account: AccountId,
    amount: u64,
    credit: bool,
    reason: TokenReason,
    booking: Option<BookingId>,
) -> Result<u64, TokenLedgerError> {
    let magnitude = i64::try_from(amount).unwrap_or(i64::MAX);
    let change = TokenChange {
        account_id: account,
        change: if credit { magnitude } else { -magnitude },
        reason,
        booking_id: booking,
    };
    tx.adjust_tokens(change)
        .await?
        .ok_or(TokenLedgerError::AccountNotFound)
}
