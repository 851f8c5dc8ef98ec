use crate::domain::contract::{ContractRequest, UserId};
use crate::domain::organization::OrganizationId;
use crate::error::{PactError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct ContractRecord {
    user: UserId,
    category: String,
    spending_limit: Decimal,
    bet_amount: Decimal,
    #[serde(default)]
    anti_charity: Option<String>,
    #[serde(default)]
    organization: Option<OrganizationId>,
    start_date: NaiveDate,
    duration_days: u32,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    payer: Option<String>,
    /// `|`-separated merchant keywords.
    #[serde(default)]
    keywords: Option<String>,
}

impl From<ContractRecord> for ContractRequest {
    fn from(record: ContractRecord) -> Self {
        ContractRequest {
            user_id: record.user,
            category: record.category,
            merchant_keywords: record
                .keywords
                .map(|kws| kws.split('|').map(str::to_string).collect())
                .unwrap_or_default(),
            spending_limit: record.spending_limit,
            bet_amount: record.bet_amount,
            anti_charity: record.anti_charity,
            organization_id: record.organization,
            start_date: record.start_date,
            duration_days: record.duration_days,
            payment_method_reference: record.payment_method,
            payer_reference: record.payer,
        }
    }
}

/// Reads contract requests to open.
///
/// Header: `user,category,spending_limit,bet_amount,anti_charity,organization,
/// start_date,duration_days,payment_method,payer,keywords`.
pub struct ContractReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ContractReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: super::reader(source),
        }
    }

    pub fn requests(self) -> impl Iterator<Item = Result<ContractRequest>> {
        self.reader
            .into_deserialize::<ContractRecord>()
            .map(|result| result.map(ContractRequest::from).map_err(PactError::from))
    }
}
