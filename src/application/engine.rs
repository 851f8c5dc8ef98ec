use super::locks::ContractLocks;
use crate::config::EngineConfig;
use crate::domain::aggregate::{aggregate, elapsed_window};
use crate::domain::contract::{
    Contract, ContractId, ContractProgress, ContractRequest, ContractStatus, ContractUpdate,
    PaymentUpdate, PenaltyState, UserId,
};
use crate::domain::lifecycle::{ChargeDirective, ChargeSkip, Decision, charge_directive, decide};
use crate::domain::payment::{ChargeRequest, ChargeResult};
use crate::domain::ports::{
    ContractStoreBox, OrganizationDirectoryBox, PaymentExecutorBox, TransactionFeedBox,
};
use crate::domain::transaction::{DateRange, Transaction};
use crate::error::{PactError, Result};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::{error, info, instrument, warn};

/// What happened to the penalty of a contract during one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    NotAttempted(ChargeSkip),
    Charged { reference: String },
    Failed { reason: String },
}

impl From<ChargeResult> for ChargeOutcome {
    fn from(result: ChargeResult) -> Self {
        match result {
            ChargeResult::Charged { reference } => ChargeOutcome::Charged { reference },
            ChargeResult::Failed { reason } => ChargeOutcome::Failed { reason },
        }
    }
}

/// Result of evaluating one contract, reflecting what is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractEvaluation {
    pub previous_status: ContractStatus,
    pub contract: Contract,
    pub progress: ContractProgress,
    /// Set when this pass found a breach.
    pub charge: Option<ChargeOutcome>,
}

impl ContractEvaluation {
    pub fn transitioned(&self) -> bool {
        self.previous_status != self.contract.status
    }

    pub fn penalty(&self) -> PenaltyState {
        self.contract.penalty_state()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub user_id: UserId,
    pub today: NaiveDate,
    pub evaluations: Vec<ContractEvaluation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeAttempt {
    pub contract: Contract,
    pub outcome: ChargeOutcome,
}

/// Enforces spending contracts against a user's transactions.
///
/// Evaluation is the only entry point that moves a contract's status. Reads go
/// straight to the store and never recompute anything.
pub struct EnforcementEngine {
    contracts: ContractStoreBox,
    feed: TransactionFeedBox,
    payments: PaymentExecutorBox,
    organizations: OrganizationDirectoryBox,
    locks: ContractLocks,
    config: EngineConfig,
}

impl EnforcementEngine {
    pub fn new(
        contracts: ContractStoreBox,
        feed: TransactionFeedBox,
        payments: PaymentExecutorBox,
        organizations: OrganizationDirectoryBox,
        config: EngineConfig,
    ) -> Self {
        Self {
            contracts,
            feed,
            payments,
            organizations,
            locks: ContractLocks::new(),
            config,
        }
    }

    /// Validates a request and opens the contract.
    #[instrument(skip(self, request), fields(user_id = request.user_id))]
    pub async fn create_contract(&self, request: ContractRequest) -> Result<Contract> {
        let organization = match request.organization_id {
            Some(id) => Some(
                self.organizations
                    .resolve(id)
                    .await?
                    .ok_or(PactError::OrganizationNotFound(id))?,
            ),
            None => None,
        };
        let terms = request.validate(organization.as_ref())?;
        let contract = self.contracts.create(terms, Utc::now()).await?;
        info!(
            contract_id = contract.id,
            category = %contract.category,
            limit = %contract.spending_limit,
            "Contract opened"
        );
        Ok(contract)
    }

    pub async fn get_contract(&self, id: ContractId) -> Result<Contract> {
        self.contracts
            .get(id)
            .await?
            .ok_or(PactError::ContractNotFound(id))
    }

    pub async fn list_contracts(&self, user_id: UserId) -> Result<Vec<Contract>> {
        self.contracts.list_for_user(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_contract(&self, id: ContractId) -> Result<()> {
        let guard = self.locks.acquire(id).await;
        let existed = self.contracts.delete(id).await?;
        drop(guard);
        self.locks.forget(id).await;
        if existed {
            info!("Contract deleted");
            Ok(())
        } else {
            Err(PactError::ContractNotFound(id))
        }
    }

    /// Attaches a payment instrument so a later breach can be charged.
    #[instrument(skip(self, payment_method_reference, payer_reference))]
    pub async fn save_payment_method(
        &self,
        id: ContractId,
        payment_method_reference: String,
        payer_reference: Option<String>,
    ) -> Result<Contract> {
        let _guard = self.locks.acquire(id).await;
        let contract = self.get_contract(id).await?;
        let update = ContractUpdate::payment(
            contract.status,
            PaymentUpdate::MethodSaved {
                payment_method_reference,
                payer_reference,
            },
        );
        self.contracts.update(id, update).await
    }

    /// Display values for a contract given its spend; no side effects.
    pub fn progress(
        &self,
        contract: &Contract,
        spent: Decimal,
        today: NaiveDate,
    ) -> ContractProgress {
        contract.progress(spent, today, self.config.danger_threshold)
    }

    /// Evaluates every active contract of `user_id` as of `today`.
    ///
    /// The feed is read once for the whole batch. If it cannot be read in full
    /// nothing is written and [`PactError::FeedUnavailable`] is returned.
    #[instrument(skip(self))]
    pub async fn evaluate_user(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<EvaluationReport> {
        let contracts = self.contracts.list_active_for_user(user_id, today).await?;

        let mut evaluations = Vec::with_capacity(contracts.len());
        if !contracts.is_empty() {
            let transactions = self.fetch_transactions(user_id, &contracts, today).await?;
            for contract in contracts {
                let spent = aggregate(&contract, &transactions, today);
                evaluations.push(self.settle(contract, spent, today).await?);
            }
        }

        Ok(EvaluationReport {
            user_id,
            today,
            evaluations,
        })
    }

    /// Evaluates each user owning an active contract, independently.
    pub async fn evaluate_all(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<(UserId, Result<EvaluationReport>)>> {
        let users: BTreeSet<UserId> = self
            .contracts
            .list_active_as_of(today)
            .await?
            .iter()
            .map(|c| c.user_id)
            .collect();

        let mut reports = Vec::with_capacity(users.len());
        for user_id in users {
            reports.push((user_id, self.evaluate_user(user_id, today).await));
        }
        Ok(reports)
    }

    /// Charges a lost contract whose penalty is still outstanding.
    #[instrument(skip(self))]
    pub async fn retry_charge(&self, id: ContractId) -> Result<ChargeAttempt> {
        let guard = self.locks.acquire(id).await;
        let contract = self.get_contract(id).await?;
        if contract.status != ContractStatus::Lost {
            return Err(PactError::ValidationError(format!(
                "Contract {} has not been lost",
                id
            )));
        }
        if !contract.retry_eligible() {
            let skip = match charge_directive(&contract) {
                ChargeDirective::Skip(skip) => skip,
                ChargeDirective::Dispatch => ChargeSkip::AlreadyCharged,
            };
            return Ok(ChargeAttempt {
                contract,
                outcome: ChargeOutcome::NotAttempted(skip),
            });
        }

        let result = self.dispatch_charge(&contract).await?;
        let update = ContractUpdate::payment(ContractStatus::Lost, result.clone().into());
        let contract = self.persist(id, update).await?;
        drop(guard);
        self.release_if_settled(&contract).await;
        Ok(ChargeAttempt {
            contract,
            outcome: result.into(),
        })
    }

    /// Retries every outstanding penalty of `user_id`.
    pub async fn retry_pending_charges(&self, user_id: UserId) -> Result<Vec<ChargeAttempt>> {
        let pending: Vec<ContractId> = self
            .contracts
            .list_for_user(user_id)
            .await?
            .iter()
            .filter(|c| c.retry_eligible())
            .map(|c| c.id)
            .collect();

        let mut attempts = Vec::with_capacity(pending.len());
        for id in pending {
            attempts.push(self.retry_charge(id).await?);
        }
        Ok(attempts)
    }

    async fn fetch_transactions(
        &self,
        user_id: UserId,
        contracts: &[Contract],
        today: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let Some(range) = contracts
            .iter()
            .filter_map(|c| elapsed_window(c, today))
            .reduce(DateRange::union)
        else {
            return Ok(Vec::new());
        };

        // the stream may block between records, so it is drained off the
        // runtime where the timeout can still fire
        let drain = async {
            let stream = self.feed.fetch(user_id, range).await?;
            tokio::task::spawn_blocking(move || stream.collect::<Result<Vec<Transaction>>>())
                .await
                .map_err(|e| PactError::FeedUnavailable(e.to_string()))?
        };
        match tokio::time::timeout(self.config.feed_timeout, drain).await {
            Ok(Ok(transactions)) => Ok(transactions),
            Ok(Err(e)) => {
                error!(error = %e, "Transaction feed failed; evaluation aborted");
                Err(match e {
                    PactError::FeedUnavailable(_) => e,
                    other => PactError::FeedUnavailable(other.to_string()),
                })
            }
            Err(_) => {
                error!(timeout = ?self.config.feed_timeout, "Transaction feed timed out");
                Err(PactError::FeedUnavailable(format!(
                    "timed out after {:?}",
                    self.config.feed_timeout
                )))
            }
        }
    }

    async fn settle(
        &self,
        contract: Contract,
        spent: Decimal,
        today: NaiveDate,
    ) -> Result<ContractEvaluation> {
        let previous_status = contract.status;
        let (stored, charge) = match decide(&contract, spent, today) {
            Decision::Unchanged => (contract, None),
            Decision::Won | Decision::Lost(_) => {
                self.record_transition(contract.id, spent, today).await?
            }
        };

        Ok(ContractEvaluation {
            previous_status,
            progress: self.progress(&stored, spent, today),
            contract: stored,
            charge,
        })
    }

    /// Decides again under the contract's lock and stores the outcome.
    ///
    /// A contract settled by an overlapping evaluation comes back unchanged.
    async fn record_transition(
        &self,
        id: ContractId,
        spent: Decimal,
        today: NaiveDate,
    ) -> Result<(Contract, Option<ChargeOutcome>)> {
        let guard = self.locks.acquire(id).await;
        let current = self.get_contract(id).await?;
        let (stored, outcome) = match decide(&current, spent, today) {
            Decision::Unchanged => (current, None),
            Decision::Won => (self.record_win(id).await?, None),
            Decision::Lost(directive) => {
                let (stored, outcome) = self.record_breach(&current, directive).await?;
                info!(
                    contract_id = id,
                    spent = %spent,
                    limit = %stored.spending_limit,
                    payment_status = ?stored.payment_status,
                    "Contract lost"
                );
                (stored, Some(outcome))
            }
        };
        drop(guard);
        self.release_if_settled(&stored).await;
        Ok((stored, outcome))
    }

    async fn record_win(&self, id: ContractId) -> Result<Contract> {
        let update = ContractUpdate::transition(ContractStatus::Active, ContractStatus::Won);
        match self.contracts.update(id, update).await {
            Ok(stored) => {
                info!(contract_id = id, "Contract won");
                Ok(stored)
            }
            // settled through another store handle
            Err(PactError::Conflict { .. }) => self.get_contract(id).await,
            Err(e) => Err(e),
        }
    }

    /// Marks a breached contract lost and charges it when `directive` says so.
    /// The caller holds the contract's lock.
    async fn record_breach(
        &self,
        current: &Contract,
        directive: ChargeDirective,
    ) -> Result<(Contract, ChargeOutcome)> {
        let lose = ContractUpdate::transition(ContractStatus::Active, ContractStatus::Lost);
        let (update, outcome) = match directive {
            ChargeDirective::Dispatch => {
                let result = self.dispatch_charge(current).await?;
                (lose.with_payment(result.clone().into()), result.into())
            }
            ChargeDirective::Skip(skip) => (lose, ChargeOutcome::NotAttempted(skip)),
        };
        let stored = self.persist(current.id, update).await?;
        Ok((stored, outcome))
    }

    /// Drops the lock entry of a contract nothing will write again.
    async fn release_if_settled(&self, contract: &Contract) {
        if contract.is_settled() {
            self.locks.forget(contract.id).await;
        }
    }

    async fn dispatch_charge(&self, contract: &Contract) -> Result<ChargeResult> {
        let organization = match contract.organization_id {
            Some(org_id) => {
                let org = self.organizations.resolve(org_id).await?;
                if org.is_none() {
                    warn!(
                        contract_id = contract.id,
                        org_id, "Organization gone; retaining penalty"
                    );
                }
                org
            }
            None => None,
        };

        let request = match ChargeRequest::for_contract(
            contract,
            organization.as_ref(),
            self.config.platform_fee_bps,
        ) {
            Ok(request) => request,
            Err(e) => {
                return Ok(ChargeResult::Failed {
                    reason: e.to_string(),
                });
            }
        };

        let result = self.payments.charge(&request).await;
        match &result {
            ChargeResult::Charged { reference } => info!(
                contract_id = contract.id,
                reference = %reference,
                amount_minor = request.amount_minor,
                "Penalty charged"
            ),
            ChargeResult::Failed { reason } => {
                warn!(contract_id = contract.id, reason = %reason, "Penalty charge failed")
            }
        }
        Ok(result)
    }

    /// Stores an update. A charge outcome whose status write raced with
    /// another loss is still recorded; it never lands on any other status.
    async fn persist(&self, id: ContractId, update: ContractUpdate) -> Result<Contract> {
        let result = match self.contracts.update(id, update.clone()).await {
            Err(PactError::Conflict {
                found: ContractStatus::Lost,
                ..
            }) if update.payment.is_some() => {
                let payment_only = ContractUpdate {
                    expected_status: ContractStatus::Lost,
                    status: ContractStatus::Lost,
                    payment: update.payment.clone(),
                };
                self.contracts.update(id, payment_only).await
            }
            other => other,
        };
        match &result {
            Err(PactError::DuplicateCharge {
                existing,
                attempted,
                ..
            }) => error!(
                contract_id = id,
                existing = %existing,
                attempted = %attempted,
                "Penalty charged twice; manual refund required"
            ),
            Err(PactError::Conflict { found, .. })
                if matches!(update.payment, Some(PaymentUpdate::Charged { .. })) =>
            {
                error!(
                    contract_id = id,
                    found = ?found,
                    "Penalty charged on a contract settled elsewhere; manual refund required"
                )
            }
            _ => {}
        }
        result
    }
}
