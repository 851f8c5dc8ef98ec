//! Attribution of transactions to a contract.
//!
//! A transaction counts toward a contract when it is an outflow, its primary
//! category equals the contract category, its merchant name matches one of the
//! contract keywords (if any), and it is dated inside the elapsed window
//! `[start_date, min(end_date, today)]`.

use super::contract::{Contract, round_money};
use super::transaction::{DateRange, Transaction};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// The part of the contract window that has already happened.
///
/// `None` before the contract starts.
pub fn elapsed_window(contract: &Contract, today: NaiveDate) -> Option<DateRange> {
    DateRange::new(contract.start_date, contract.end_date.min(today))
}

pub fn attributes(contract: &Contract, tx: &Transaction, window: &DateRange) -> bool {
    if !tx.is_outflow() || !window.contains(tx.date) {
        return false;
    }
    if tx.category.primary != contract.category.as_str() {
        return false;
    }
    if contract.merchant_keywords.is_empty() {
        return true;
    }
    let name = tx.name.to_lowercase();
    contract
        .merchant_keywords
        .iter()
        .any(|kw| name.contains(kw.as_str()))
}

/// Spend attributed to `contract` as of `today`, rounded to cents.
pub fn aggregate<'a, I>(contract: &Contract, transactions: I, today: NaiveDate) -> Decimal
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let Some(window) = elapsed_window(contract, today) else {
        return Decimal::ZERO;
    };
    let total = transactions
        .into_iter()
        .filter(|tx| attributes(contract, tx, &window))
        .fold(Decimal::ZERO, |acc, tx| acc.saturating_add(tx.amount));
    round_money(total)
}
