use super::contract::{Contract, ContractStatus, PaymentStatus};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Why a breached contract is not charged on this pass.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChargeSkip {
    NoPaymentMethod,
    AlreadyCharged,
    PreviouslyFailed,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChargeDirective {
    Dispatch,
    Skip(ChargeSkip),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Decision {
    Unchanged,
    Won,
    Lost(ChargeDirective),
}

/// Decides the next status of a contract.
///
/// Terminal contracts never move. A breach wins over expiry when both hold on
/// the same day.
pub fn decide(contract: &Contract, spent: Decimal, today: NaiveDate) -> Decision {
    if contract.status != ContractStatus::Active {
        return Decision::Unchanged;
    }
    if spent > contract.spending_limit.value() {
        return Decision::Lost(charge_directive(contract));
    }
    if today > contract.end_date {
        return Decision::Won;
    }
    Decision::Unchanged
}

pub fn charge_directive(contract: &Contract) -> ChargeDirective {
    if contract.charge_reference.is_some() {
        return ChargeDirective::Skip(ChargeSkip::AlreadyCharged);
    }
    match contract.payment_status {
        PaymentStatus::CardSaved => ChargeDirective::Dispatch,
        PaymentStatus::NoCard => ChargeDirective::Skip(ChargeSkip::NoPaymentMethod),
        PaymentStatus::Charged => ChargeDirective::Skip(ChargeSkip::AlreadyCharged),
        PaymentStatus::Failed => ChargeDirective::Skip(ChargeSkip::PreviouslyFailed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::tests::{coffee_contract, date};
    use rust_decimal_macros::dec;

    #[test]
    fn test_breach_loses_and_dispatches() {
        let contract = coffee_contract();
        assert_eq!(
            decide(&contract, dec!(55), date("2026-03-03")),
            Decision::Lost(ChargeDirective::Dispatch)
        );
    }

    #[test]
    fn test_spend_equal_to_limit_is_not_a_breach() {
        let contract = coffee_contract();
        assert_eq!(
            decide(&contract, dec!(50), date("2026-03-03")),
            Decision::Unchanged
        );
    }

    #[test]
    fn test_expiry_wins_contract() {
        let contract = coffee_contract();
        assert_eq!(decide(&contract, dec!(10), date("2026-04-01")), Decision::Won);
        // end_date itself is still inside the window
        assert_eq!(
            decide(&contract, dec!(10), date("2026-03-31")),
            Decision::Unchanged
        );
    }

    #[test]
    fn test_breach_takes_priority_over_expiry() {
        let contract = coffee_contract();
        assert!(matches!(
            decide(&contract, dec!(60), date("2026-04-02")),
            Decision::Lost(_)
        ));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for status in [ContractStatus::Won, ContractStatus::Lost] {
            let mut contract = coffee_contract();
            contract.status = status;
            assert_eq!(
                decide(&contract, dec!(1000), date("2026-04-02")),
                Decision::Unchanged
            );
        }
    }

    #[test]
    fn test_charge_skips() {
        let mut contract = coffee_contract();
        contract.payment_status = PaymentStatus::NoCard;
        assert_eq!(
            charge_directive(&contract),
            ChargeDirective::Skip(ChargeSkip::NoPaymentMethod)
        );

        contract.payment_status = PaymentStatus::CardSaved;
        contract.charge_reference = Some("ch_1".to_string());
        assert_eq!(
            charge_directive(&contract),
            ChargeDirective::Skip(ChargeSkip::AlreadyCharged)
        );
    }
}
