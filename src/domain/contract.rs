use super::organization::{Organization, OrganizationId};
use crate::error::{PactError, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ContractId = u64;
pub type UserId = u32;

/// Largest limit or stake a contract accepts.
pub const MAX_AMOUNT: Decimal = dec!(1000000000);

/// Rounds a monetary value to cents, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A strictly positive monetary amount, held at cent precision.
///
/// Used for the spending limit and the stake of a contract. Deserialization goes
/// through the same validation as [`Amount::new`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        let value = round_money(value);
        if value <= Decimal::ZERO {
            return Err(PactError::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }
        if value > MAX_AMOUNT {
            return Err(PactError::ValidationError(format!(
                "Amount must not exceed {}",
                MAX_AMOUNT
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PactError;

    fn try_from(value: Decimal) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed vocabulary of spending categories a contract can restrict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    FoodAndDrink,
    Coffee,
    Groceries,
    GeneralMerchandise,
    Entertainment,
    Transportation,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::FoodAndDrink,
        Category::Coffee,
        Category::Groceries,
        Category::GeneralMerchandise,
        Category::Entertainment,
        Category::Transportation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FoodAndDrink => "FOOD_AND_DRINK",
            Category::Coffee => "COFFEE",
            Category::Groceries => "GROCERIES",
            Category::GeneralMerchandise => "GENERAL_MERCHANDISE",
            Category::Entertainment => "ENTERTAINMENT",
            Category::Transportation => "TRANSPORTATION",
        }
    }
}

impl FromStr for Category {
    type Err = PactError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let tag = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == tag)
            .ok_or_else(|| PactError::ValidationError(format!("Unknown category '{}'", tag)))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Active,
    Won,
    Lost,
}

impl ContractStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ContractStatus::Active)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    NoCard,
    CardSaved,
    Charged,
    Failed,
}

/// Unvalidated request to open a contract, as it arrives from a caller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContractRequest {
    pub user_id: UserId,
    pub category: String,
    #[serde(default)]
    pub merchant_keywords: Vec<String>,
    pub spending_limit: Decimal,
    pub bet_amount: Decimal,
    pub anti_charity: Option<String>,
    pub organization_id: Option<OrganizationId>,
    pub start_date: NaiveDate,
    pub duration_days: u32,
    pub payment_method_reference: Option<String>,
    pub payer_reference: Option<String>,
}

impl ContractRequest {
    /// Checks the request and resolves the penalty recipient.
    ///
    /// `organization` must be the directory entry for `organization_id` when one
    /// was referenced; its name wins over any `anti_charity` supplied directly.
    pub fn validate(self, organization: Option<&Organization>) -> Result<ContractTerms> {
        let category: Category = self.category.parse()?;
        let out_of_range = |field: &str| {
            PactError::ValidationError(format!(
                "{} must be positive and at most {}",
                field, MAX_AMOUNT
            ))
        };
        let spending_limit =
            Amount::new(self.spending_limit).map_err(|_| out_of_range("spending_limit"))?;
        let bet_amount = Amount::new(self.bet_amount).map_err(|_| out_of_range("bet_amount"))?;
        if self.duration_days == 0 {
            return Err(PactError::ValidationError(
                "duration_days must be at least 1".to_string(),
            ));
        }

        let anti_charity = match (organization, self.anti_charity) {
            (Some(org), _) => org.name.clone(),
            (None, Some(name)) if !name.trim().is_empty() => name.trim().to_string(),
            _ => {
                return Err(PactError::ValidationError(
                    "A penalty recipient is required".to_string(),
                ));
            }
        };

        let merchant_keywords = self
            .merchant_keywords
            .iter()
            .map(|kw| kw.trim().to_lowercase())
            .filter(|kw| !kw.is_empty())
            .collect();

        Ok(ContractTerms {
            user_id: self.user_id,
            category,
            merchant_keywords,
            spending_limit,
            bet_amount,
            anti_charity,
            organization_id: organization.map(|org| org.id),
            start_date: self.start_date,
            duration_days: self.duration_days,
            payment_method_reference: self.payment_method_reference.filter(|r| !r.is_empty()),
            payer_reference: self.payer_reference.filter(|r| !r.is_empty()),
        })
    }
}

/// Validated terms from which a store opens a new contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractTerms {
    pub user_id: UserId,
    pub category: Category,
    pub merchant_keywords: Vec<String>,
    pub spending_limit: Amount,
    pub bet_amount: Amount,
    pub anti_charity: String,
    pub organization_id: Option<OrganizationId>,
    pub start_date: NaiveDate,
    pub duration_days: u32,
    pub payment_method_reference: Option<String>,
    pub payer_reference: Option<String>,
}

/// A stored spending restriction and the state of its penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub user_id: UserId,
    pub category: Category,
    /// Lowercased merchant name fragments; empty matches every merchant.
    #[serde(default)]
    pub merchant_keywords: Vec<String>,
    pub spending_limit: Amount,
    pub bet_amount: Amount,
    pub anti_charity: String,
    pub organization_id: Option<OrganizationId>,
    pub start_date: NaiveDate,
    /// Always `start_date + duration`, fixed when the contract is opened.
    pub end_date: NaiveDate,
    pub status: ContractStatus,
    pub payment_method_reference: Option<String>,
    pub payer_reference: Option<String>,
    pub payment_status: PaymentStatus,
    pub charge_reference: Option<String>,
    pub charge_failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Contract {
    pub fn open(id: ContractId, terms: ContractTerms, created_at: DateTime<Utc>) -> Result<Self> {
        let end_date = terms
            .start_date
            .checked_add_days(Days::new(u64::from(terms.duration_days)))
            .ok_or_else(|| PactError::ValidationError("duration overflows the calendar".into()))?;
        let payment_status = if terms.payment_method_reference.is_some() {
            PaymentStatus::CardSaved
        } else {
            PaymentStatus::NoCard
        };

        Ok(Self {
            id,
            user_id: terms.user_id,
            category: terms.category,
            merchant_keywords: terms.merchant_keywords,
            spending_limit: terms.spending_limit,
            bet_amount: terms.bet_amount,
            anti_charity: terms.anti_charity,
            organization_id: terms.organization_id,
            start_date: terms.start_date,
            end_date,
            status: ContractStatus::Active,
            payment_method_reference: terms.payment_method_reference,
            payer_reference: terms.payer_reference,
            payment_status,
            charge_reference: None,
            charge_failure_reason: None,
            created_at,
        })
    }

    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// A lost contract whose penalty was never collected.
    pub fn retry_eligible(&self) -> bool {
        self.status == ContractStatus::Lost
            && self.charge_reference.is_none()
            && matches!(
                self.payment_status,
                PaymentStatus::CardSaved | PaymentStatus::Failed
            )
    }

    /// Terminal with nothing left to collect.
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal() && !self.retry_eligible()
    }

    pub fn penalty_state(&self) -> PenaltyState {
        if self.status != ContractStatus::Lost {
            return PenaltyState::NotDue;
        }
        match self.payment_status {
            PaymentStatus::Charged => PenaltyState::Collected,
            PaymentStatus::CardSaved | PaymentStatus::Failed => PenaltyState::Pending,
            PaymentStatus::NoCard => PenaltyState::Uncollectable,
        }
    }

    /// Applies an update all-or-nothing.
    ///
    /// Fails with [`PactError::Conflict`] when the stored status is not the one the
    /// caller read, and with [`PactError::DuplicateCharge`] when a second
    /// successful charge is recorded.
    pub fn apply(&mut self, update: &ContractUpdate) -> Result<()> {
        if self.status != update.expected_status {
            return Err(PactError::Conflict {
                id: self.id,
                expected: update.expected_status,
                found: self.status,
            });
        }
        if self.status.is_terminal() && update.status != self.status {
            return Err(PactError::ValidationError(format!(
                "Contract {} is {:?} and cannot move to {:?}",
                self.id, self.status, update.status
            )));
        }
        let settles_penalty = matches!(
            update.payment,
            Some(PaymentUpdate::Charged { .. } | PaymentUpdate::Failed { .. })
        );
        if settles_penalty && update.status != ContractStatus::Lost {
            return Err(PactError::ValidationError(format!(
                "Contract {} is {:?}; only a lost contract is charged",
                self.id, update.status
            )));
        }

        let mut next = self.clone();
        next.status = update.status;
        match &update.payment {
            None => {}
            Some(PaymentUpdate::MethodSaved {
                payment_method_reference,
                payer_reference,
            }) => {
                if self.payment_status == PaymentStatus::Charged {
                    return Err(PactError::ValidationError(format!(
                        "Contract {} is already charged",
                        self.id
                    )));
                }
                next.payment_method_reference = Some(payment_method_reference.clone());
                next.payer_reference = payer_reference.clone();
                next.payment_status = PaymentStatus::CardSaved;
                next.charge_failure_reason = None;
            }
            Some(PaymentUpdate::Charged { reference }) => {
                if let Some(existing) = &self.charge_reference {
                    return Err(PactError::DuplicateCharge {
                        id: self.id,
                        existing: existing.clone(),
                        attempted: reference.clone(),
                    });
                }
                next.payment_status = PaymentStatus::Charged;
                next.charge_reference = Some(reference.clone());
                next.charge_failure_reason = None;
            }
            Some(PaymentUpdate::Failed { reason }) => {
                // A recorded success stays authoritative over a late failure.
                if self.charge_reference.is_none() {
                    next.payment_status = PaymentStatus::Failed;
                    next.charge_failure_reason = Some(reason.clone());
                }
            }
        }

        *self = next;
        Ok(())
    }

    /// Derived display values; never persisted.
    pub fn progress(
        &self,
        spent: Decimal,
        today: NaiveDate,
        danger_threshold: Decimal,
    ) -> ContractProgress {
        let limit = self.spending_limit.value();
        // saturates instead of overflowing on absurd spend
        let percentage = if limit > Decimal::ZERO {
            spent
                .checked_div(limit)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .unwrap_or(Decimal::MAX)
                .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
        } else {
            Decimal::ZERO
        };
        let days_remaining = (self.end_date - today).num_days().max(0);
        let display = match self.status {
            ContractStatus::Won => DisplayStatus::Won,
            ContractStatus::Lost => DisplayStatus::Lost,
            ContractStatus::Active if percentage >= danger_threshold => DisplayStatus::Danger,
            ContractStatus::Active => DisplayStatus::OnTrack,
        };

        ContractProgress {
            spent,
            percentage,
            days_remaining,
            display,
        }
    }
}

/// Conditional mutation of a stored contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractUpdate {
    /// Status the caller observed; the write is rejected if it moved since.
    pub expected_status: ContractStatus,
    pub status: ContractStatus,
    pub payment: Option<PaymentUpdate>,
}

impl ContractUpdate {
    pub fn transition(from: ContractStatus, to: ContractStatus) -> Self {
        Self {
            expected_status: from,
            status: to,
            payment: None,
        }
    }

    pub fn payment(status: ContractStatus, payment: PaymentUpdate) -> Self {
        Self::transition(status, status).with_payment(payment)
    }

    pub fn with_payment(mut self, payment: PaymentUpdate) -> Self {
        self.payment = Some(payment);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentUpdate {
    MethodSaved {
        payment_method_reference: String,
        payer_reference: Option<String>,
    },
    Charged {
        reference: String,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    OnTrack,
    Danger,
    Won,
    Lost,
}

/// Where the penalty of a contract stands.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyState {
    NotDue,
    Collected,
    /// Breach confirmed but the charge has not gone through yet.
    Pending,
    Uncollectable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractProgress {
    pub spent: Decimal,
    pub percentage: Decimal,
    pub days_remaining: i64,
    pub display: DisplayStatus,
}
