use super::contract::{Contract, ContractId, ContractTerms, ContractUpdate, UserId};
use super::organization::{Organization, OrganizationId};
use super::payment::{ChargeRequest, ChargeResult};
use super::transaction::{DateRange, Transaction};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Opens a contract from validated terms and assigns its id.
    async fn create(&self, terms: ContractTerms, created_at: DateTime<Utc>) -> Result<Contract>;
    async fn get(&self, id: ContractId) -> Result<Option<Contract>>;
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Contract>>;
    /// Active contracts whose window has started by `today`.
    async fn list_active_as_of(&self, today: NaiveDate) -> Result<Vec<Contract>>;
    /// Same as [`ContractStore::list_active_as_of`], restricted to one owner.
    async fn list_active_for_user(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Vec<Contract>>;
    /// Applies `update` atomically, failing if the stored status moved.
    async fn update(&self, id: ContractId, update: ContractUpdate) -> Result<Contract>;
    /// Hard delete. Returns whether a record existed.
    async fn delete(&self, id: ContractId) -> Result<bool>;
}

/// Lazy, finite, single-pass sequence of transactions.
///
/// Pulling a record may block, e.g. on file or network reads.
pub type TransactionStream = Box<dyn Iterator<Item = Result<Transaction>> + Send>;

#[async_trait]
pub trait TransactionFeed: Send + Sync {
    async fn fetch(&self, user_id: UserId, range: DateRange) -> Result<TransactionStream>;
}

#[async_trait]
pub trait PaymentExecutor: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> ChargeResult;
}

#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    async fn resolve(&self, id: OrganizationId) -> Result<Option<Organization>>;
}

pub type ContractStoreBox = Box<dyn ContractStore>;
pub type TransactionFeedBox = Box<dyn TransactionFeed>;
pub type PaymentExecutorBox = Box<dyn PaymentExecutor>;
pub type OrganizationDirectoryBox = Box<dyn OrganizationDirectory>;
