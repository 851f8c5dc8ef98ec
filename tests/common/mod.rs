#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use pactkeeper::domain::contract::{ContractRequest, UserId};
use pactkeeper::domain::ports::{TransactionFeed, TransactionStream};
use pactkeeper::domain::transaction::{CategoryClassification, DateRange, Transaction};
use pactkeeper::error::{PactError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::NamedTempFile;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn tx(user_id: UserId, id: &str, category: &str, amount: Decimal, day: &str) -> Transaction {
    Transaction {
        id: id.to_string(),
        user_id,
        name: "Corner Cafe".to_string(),
        amount,
        date: date(day),
        category: CategoryClassification {
            primary: category.to_string(),
            detailed: None,
            confidence: Default::default(),
        },
        is_mock: false,
    }
}

/// COFFEE, limit 50, stake 20, 30 days from 2026-03-01, card saved.
pub fn coffee_request(user_id: UserId) -> ContractRequest {
    ContractRequest {
        user_id,
        category: "COFFEE".to_string(),
        merchant_keywords: Vec::new(),
        spending_limit: dec!(50),
        bet_amount: dec!(20),
        anti_charity: Some("Flat Earth Society".to_string()),
        organization_id: None,
        start_date: date("2026-03-01"),
        duration_days: 30,
        payment_method_reference: Some("pm_card_visa".to_string()),
        payer_reference: Some(format!("cus_{}", user_id)),
    }
}

/// Yields `good` records, then an error.
pub struct BrokenFeed {
    pub good: Vec<Transaction>,
}

#[async_trait]
impl TransactionFeed for BrokenFeed {
    async fn fetch(&self, _user_id: UserId, _range: DateRange) -> Result<TransactionStream> {
        let records: Vec<Result<Transaction>> = self
            .good
            .iter()
            .cloned()
            .map(Ok)
            .chain(std::iter::once(Err(PactError::FeedUnavailable(
                "connection reset".to_string(),
            ))))
            .collect();
        Ok(Box::new(records.into_iter()))
    }
}

/// Never answers within any reasonable timeout.
pub struct StalledFeed;

#[async_trait]
impl TransactionFeed for StalledFeed {
    async fn fetch(&self, _user_id: UserId, _range: DateRange) -> Result<TransactionStream> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Box::new(std::iter::empty()))
    }
}

/// Blocks for `delay` before every record.
pub struct SlowFeed {
    pub records: Vec<Transaction>,
    pub delay: Duration,
}

#[async_trait]
impl TransactionFeed for SlowFeed {
    async fn fetch(&self, _user_id: UserId, _range: DateRange) -> Result<TransactionStream> {
        let delay = self.delay;
        Ok(Box::new(self.records.clone().into_iter().map(move |tx| {
            std::thread::sleep(delay);
            Ok(tx)
        })))
    }
}

/// Serves its records to the first fetch only; later fetches see nothing.
pub struct FirstFetchFeed {
    records: Vec<Transaction>,
    served: AtomicBool,
}

impl FirstFetchFeed {
    pub fn new(records: Vec<Transaction>) -> Self {
        Self {
            records,
            served: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TransactionFeed for FirstFetchFeed {
    async fn fetch(&self, _user_id: UserId, _range: DateRange) -> Result<TransactionStream> {
        if self.served.swap(true, Ordering::SeqCst) {
            return Ok(Box::new(std::iter::empty()));
        }
        Ok(Box::new(self.records.clone().into_iter().map(Ok)))
    }
}

pub fn csv_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

pub const TRANSACTIONS_HEADER: &str = "user,id,name,amount,date,category";
pub const CONTRACTS_HEADER: &str = "user,category,spending_limit,bet_amount,anti_charity,organization,start_date,duration_days,payment_method,payer,keywords";
