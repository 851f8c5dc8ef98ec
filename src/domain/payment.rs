use super::contract::{Contract, ContractId, PaymentUpdate};
use super::organization::Organization;
use crate::error::{PactError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Share of the penalty kept by the platform when it is routed to a connected
/// organization, in basis points.
pub const DEFAULT_PLATFORM_FEE_BPS: u32 = 1_000;

/// Converts a decimal amount to integer minor units (cents).
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeRouting {
    /// The platform keeps the whole amount.
    Retained,
    /// Funds go to `destination` minus the platform fee.
    Split {
        destination: String,
        platform_fee_minor: i64,
    },
}

/// Everything a payment provider needs to collect one penalty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub contract_id: ContractId,
    pub amount_minor: i64,
    pub payment_method_reference: String,
    pub payer_reference: Option<String>,
    pub recipient: String,
    pub routing: ChargeRouting,
    /// Stable per contract so a provider can drop replays.
    pub idempotency_key: String,
}

impl ChargeRequest {
    pub fn for_contract(
        contract: &Contract,
        organization: Option<&Organization>,
        platform_fee_bps: u32,
    ) -> Result<Self> {
        let payment_method_reference = contract.payment_method_reference.clone().ok_or_else(|| {
            PactError::ValidationError(format!("Contract {} has no payment method", contract.id))
        })?;
        let amount_minor = to_minor_units(contract.bet_amount.value()).ok_or_else(|| {
            PactError::ValidationError(format!(
                "Stake of contract {} is out of range",
                contract.id
            ))
        })?;

        let routing = match organization.and_then(|org| org.payout_destination.clone()) {
            Some(destination) => ChargeRouting::Split {
                destination,
                platform_fee_minor: platform_fee(amount_minor, platform_fee_bps),
            },
            None => ChargeRouting::Retained,
        };

        Ok(Self {
            contract_id: contract.id,
            amount_minor,
            payment_method_reference,
            payer_reference: contract.payer_reference.clone(),
            recipient: contract.anti_charity.clone(),
            routing,
            idempotency_key: format!("pact-{}-penalty", contract.id),
        })
    }
}

fn platform_fee(amount_minor: i64, fee_bps: u32) -> i64 {
    let fee = Decimal::from(amount_minor) * Decimal::from(fee_bps) / Decimal::from(10_000);
    fee.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
        .clamp(0, amount_minor)
}

/// Outcome reported by a payment provider. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeResult {
    Charged { reference: String },
    Failed { reason: String },
}

impl From<ChargeResult> for PaymentUpdate {
    fn from(result: ChargeResult) -> Self {
        match result {
            ChargeResult::Charged { reference } => PaymentUpdate::Charged { reference },
            ChargeResult::Failed { reason } => PaymentUpdate::Failed { reason },
        }
    }
}
