use crate::domain::contract::{Contract, ContractId, ContractTerms, ContractUpdate, UserId};
use crate::domain::ports::ContractStore;
use crate::error::{PactError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for contract records, keyed by big-endian id.
pub const CF_CONTRACTS: &str = "contracts";
/// Column Family for bookkeeping such as the id sequence.
pub const CF_META: &str = "meta";

const NEXT_ID_KEY: &[u8] = b"next_contract_id";

/// A persistent contract store using RocksDB.
///
/// Read-modify-write sequences are serialized by a writer mutex, which makes
/// conditional updates atomic per store instance. `Clone` shares both the
/// database and the mutex.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_contracts = ColumnFamilyDescriptor::new(CF_CONTRACTS, Options::default());
        let cf_meta = ColumnFamilyDescriptor::new(CF_META, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_contracts, cf_meta])?;

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PactError::IoError(std::io::Error::other(format!(
                "Column family '{}' not found",
                name
            )))
        })
    }

    fn read(&self, id: ContractId) -> Result<Option<Contract>> {
        let cf = self.cf(CF_CONTRACTS)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write(&self, contract: &Contract) -> Result<()> {
        let cf = self.cf(CF_CONTRACTS)?;
        self.db
            .put_cf(cf, contract.id.to_be_bytes(), serde_json::to_vec(contract)?)?;
        Ok(())
    }

    fn scan(&self, mut keep: impl FnMut(&Contract) -> bool) -> Result<Vec<Contract>> {
        let cf = self.cf(CF_CONTRACTS)?;
        let mut contracts = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let contract: Contract = serde_json::from_slice(&value)?;
            if keep(&contract) {
                contracts.push(contract);
            }
        }
        Ok(contracts)
    }
}

#[async_trait]
impl ContractStore for RocksDBStore {
    async fn create(&self, terms: ContractTerms, created_at: DateTime<Utc>) -> Result<Contract> {
        let _writer = self.writer.lock().await;
        let meta = self.cf(CF_META)?;
        let last_id = match self.db.get_cf(meta, NEXT_ID_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    PactError::IoError(std::io::Error::other("Corrupt contract id sequence"))
                })?;
                ContractId::from_be_bytes(raw)
            }
            None => 0,
        };
        let id = last_id + 1;
        let contract = Contract::open(id, terms, created_at)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(meta, NEXT_ID_KEY, id.to_be_bytes());
        batch.put_cf(
            self.cf(CF_CONTRACTS)?,
            id.to_be_bytes(),
            serde_json::to_vec(&contract)?,
        );
        self.db.write(batch)?;

        Ok(contract)
    }

    async fn get(&self, id: ContractId) -> Result<Option<Contract>> {
        self.read(id)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Contract>> {
        self.scan(|c| c.user_id == user_id)
    }

    async fn list_active_as_of(&self, today: NaiveDate) -> Result<Vec<Contract>> {
        self.scan(|c| !c.status.is_terminal() && c.start_date <= today)
    }

    async fn list_active_for_user(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Vec<Contract>> {
        self.scan(|c| c.user_id == user_id && !c.status.is_terminal() && c.start_date <= today)
    }

    async fn update(&self, id: ContractId, update: ContractUpdate) -> Result<Contract> {
        let _writer = self.writer.lock().await;
        let mut contract = self.read(id)?.ok_or(PactError::ContractNotFound(id))?;
        contract.apply(&update)?;
        self.write(&contract)?;
        Ok(contract)
    }

    async fn delete(&self, id: ContractId) -> Result<bool> {
        let _writer = self.writer.lock().await;
        if self.read(id)?.is_none() {
            return Ok(false);
        }
        self.db.delete_cf(self.cf(CF_CONTRACTS)?, id.to_be_bytes())?;
        Ok(true)
    }
}
