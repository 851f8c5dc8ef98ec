use crate::domain::contract::UserId;
use crate::domain::ports::{TransactionFeed, TransactionStream};
use crate::domain::transaction::{CategoryClassification, Confidence, DateRange, Transaction};
use crate::error::{PactError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct TransactionRecord {
    user: UserId,
    id: String,
    name: String,
    amount: Decimal,
    date: NaiveDate,
    category: String,
    #[serde(default)]
    category_detailed: Option<String>,
    #[serde(default)]
    confidence: Option<Confidence>,
    #[serde(default)]
    mock: Option<bool>,
}

impl From<TransactionRecord> for Transaction {
    fn from(record: TransactionRecord) -> Self {
        Transaction {
            id: record.id,
            user_id: record.user,
            name: record.name,
            amount: record.amount,
            date: record.date,
            category: CategoryClassification {
                primary: record.category,
                detailed: record.category_detailed,
                confidence: record.confidence.unwrap_or_default(),
            },
            is_mock: record.mock.unwrap_or(false),
        }
    }
}

/// Reads transactions from a CSV source.
///
/// Expected header: `user,id,name,amount,date,category` optionally followed by
/// `category_detailed,confidence,mock`.
pub struct TransactionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> TransactionReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: super::reader(source),
        }
    }

    /// Lazily deserializes the rows.
    pub fn transactions(self) -> impl Iterator<Item = Result<Transaction>> {
        self.reader
            .into_deserialize::<TransactionRecord>()
            .map(|result| result.map(Transaction::from).map_err(PactError::from))
    }
}

/// Transaction feed over a CSV export.
///
/// The file is reopened on every fetch, so each fetch sees its current content.
/// A missing file or a malformed row surfaces as [`PactError::FeedUnavailable`].
pub struct CsvTransactionFeed {
    path: PathBuf,
}

impl CsvTransactionFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TransactionFeed for CsvTransactionFeed {
    async fn fetch(&self, user_id: UserId, range: DateRange) -> Result<TransactionStream> {
        let file = File::open(&self.path).map_err(|e| {
            PactError::FeedUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let stream = TransactionReader::new(file)
            .transactions()
            .map(|result| result.map_err(|e| PactError::FeedUnavailable(e.to_string())))
            .filter(move |result| match result {
                Ok(tx) => tx.user_id == user_id && range.contains(tx.date),
                Err(_) => true,
            });
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::tests::date;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const HEADER: &str = "user, id, name, amount, date, category, category_detailed, confidence, mock";

    #[test]
    fn test_reader_valid_stream() {
        let data = format!(
            "{}\n1, t1, Blue Bottle, 4.50, 2026-03-02, COFFEE, COFFEE_SHOP, VERY_HIGH, false\n\
             1, t2, Refund, -4.50, 2026-03-03, COFFEE, , ,",
            HEADER
        );
        let reader = TransactionReader::new(data.as_bytes());
        let results: Vec<Result<Transaction>> = reader.transactions().collect();

        assert_eq!(results.len(), 2);
        let tx1 = results[0].as_ref().unwrap();
        assert_eq!(tx1.user_id, 1);
        assert_eq!(tx1.amount, dec!(4.50));
        assert_eq!(tx1.category.detailed.as_deref(), Some("COFFEE_SHOP"));
        assert_eq!(tx1.category.confidence, Confidence::VeryHigh);

        let tx2 = results[1].as_ref().unwrap();
        assert_eq!(tx2.amount, dec!(-4.50));
        assert_eq!(tx2.category.detailed, None);
        assert!(!tx2.is_mock);
    }

    #[test]
    fn test_reader_short_rows() {
        let data = "user, id, name, amount, date, category\n2, t1, Cafe, 3, 2026-03-02, COFFEE";
        let reader = TransactionReader::new(data.as_bytes());
        let tx = reader.transactions().next().unwrap().unwrap();
        assert_eq!(tx.category.confidence, Confidence::Unknown);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = format!("{}\n1, t1, Cafe, not_a_number, 2026-03-02, COFFEE", HEADER);
        let reader = TransactionReader::new(data.as_bytes());
        let results: Vec<Result<Transaction>> = reader.transactions().collect();

        assert!(results[0].is_err());
    }

    #[tokio::test]
    async fn test_csv_feed_filters_and_rereads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        writeln!(file, "1, t1, Cafe, 3, 2026-03-02, COFFEE").unwrap();
        writeln!(file, "2, t2, Cafe, 3, 2026-03-02, COFFEE").unwrap();
        writeln!(file, "1, t3, Cafe, 3, 2026-05-02, COFFEE").unwrap();
        file.flush().unwrap();

        let feed = CsvTransactionFeed::new(file.path());
        let range = DateRange::new(date("2026-03-01"), date("2026-03-31")).unwrap();
        let ids: Vec<String> = feed
            .fetch(1, range)
            .await
            .unwrap()
            .map(|tx| tx.unwrap().id)
            .collect();
        assert_eq!(ids, vec!["t1".to_string()]);

        writeln!(file, "1, t4, Cafe, 3, 2026-03-09, COFFEE").unwrap();
        file.flush().unwrap();
        assert_eq!(feed.fetch(1, range).await.unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_csv_feed_unavailable() {
        let feed = CsvTransactionFeed::new("/nonexistent/transactions.csv");
        let range = DateRange::new(date("2026-03-01"), date("2026-03-31")).unwrap();
        assert!(matches!(
            feed.fetch(1, range).await,
            Err(PactError::FeedUnavailable(_))
        ));
    }
}
