use crate::domain::contract::{Contract, ContractId, ContractTerms, ContractUpdate, UserId};
use crate::domain::organization::{Organization, OrganizationId};
use crate::domain::ports::{ContractStore, OrganizationDirectory, TransactionFeed, TransactionStream};
use crate::domain::transaction::{DateRange, Transaction};
use crate::error::{PactError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct ContractTable {
    next_id: ContractId,
    rows: BTreeMap<ContractId, Contract>,
}

/// A thread-safe in-memory store for contracts.
///
/// Every mutation runs under the table's write lock, so a conditional update is
/// a single atomic compare-and-set.
#[derive(Default, Clone)]
pub struct InMemoryContractStore {
    table: Arc<RwLock<ContractTable>>,
}

impl InMemoryContractStore {
    /// Creates a new, empty in-memory contract store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContractStore for InMemoryContractStore {
    async fn create(&self, terms: ContractTerms, created_at: DateTime<Utc>) -> Result<Contract> {
        let mut table = self.table.write().await;
        let id = table.next_id + 1;
        let contract = Contract::open(id, terms, created_at)?;
        table.next_id = id;
        table.rows.insert(id, contract.clone());
        Ok(contract)
    }

    async fn get(&self, id: ContractId) -> Result<Option<Contract>> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Contract>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_active_as_of(&self, today: NaiveDate) -> Result<Vec<Contract>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|c| !c.status.is_terminal() && c.start_date <= today)
            .cloned()
            .collect())
    }

    async fn list_active_for_user(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Vec<Contract>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|c| c.user_id == user_id)
            .filter(|c| !c.status.is_terminal() && c.start_date <= today)
            .cloned()
            .collect())
    }

    async fn update(&self, id: ContractId, update: ContractUpdate) -> Result<Contract> {
        let mut table = self.table.write().await;
        let contract = table
            .rows
            .get_mut(&id)
            .ok_or(PactError::ContractNotFound(id))?;
        contract.apply(&update)?;
        Ok(contract.clone())
    }

    async fn delete(&self, id: ContractId) -> Result<bool> {
        let mut table = self.table.write().await;
        Ok(table.rows.remove(&id).is_some())
    }
}

/// Organization lookup backed by a map, seeded up front.
#[derive(Default, Clone)]
pub struct InMemoryOrganizationDirectory {
    organizations: Arc<HashMap<OrganizationId, Organization>>,
}

impl InMemoryOrganizationDirectory {
    pub fn new(organizations: impl IntoIterator<Item = Organization>) -> Self {
        let organizations = organizations.into_iter().map(|org| (org.id, org)).collect();
        Self {
            organizations: Arc::new(organizations),
        }
    }
}

#[async_trait]
impl OrganizationDirectory for InMemoryOrganizationDirectory {
    async fn resolve(&self, id: OrganizationId) -> Result<Option<Organization>> {
        Ok(self.organizations.get(&id).cloned())
    }
}

/// Transaction feed over a fixed set of records.
#[derive(Default, Clone)]
pub struct InMemoryTransactionFeed {
    transactions: Arc<RwLock<Vec<Transaction>>>,
}

impl InMemoryTransactionFeed {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: Arc::new(RwLock::new(transactions)),
        }
    }

    pub async fn push(&self, tx: Transaction) {
        self.transactions.write().await.push(tx);
    }
}

#[async_trait]
impl TransactionFeed for InMemoryTransactionFeed {
    async fn fetch(&self, user_id: UserId, range: DateRange) -> Result<TransactionStream> {
        let snapshot: Vec<Transaction> = self
            .transactions
            .read()
            .await
            .iter()
            .filter(|tx| tx.user_id == user_id && range.contains(tx.date))
            .cloned()
            .collect();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }
}
