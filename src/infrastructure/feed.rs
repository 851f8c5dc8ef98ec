use crate::domain::contract::UserId;
use crate::domain::ports::{TransactionFeed, TransactionFeedBox, TransactionStream};
use crate::domain::transaction::{DateRange, Transaction};
use crate::error::Result;
use async_trait::async_trait;
use std::iter::Peekable;

/// Merges the banking provider's records with manually entered ones.
///
/// Each source is expected in date order; the merged stream then is too.
/// Records coming from the manual source are flagged as mock.
pub struct MergedTransactionFeed {
    external: TransactionFeedBox,
    manual: TransactionFeedBox,
}

impl MergedTransactionFeed {
    pub fn new(external: TransactionFeedBox, manual: TransactionFeedBox) -> Self {
        Self { external, manual }
    }
}

#[async_trait]
impl TransactionFeed for MergedTransactionFeed {
    async fn fetch(&self, user_id: UserId, range: DateRange) -> Result<TransactionStream> {
        let external = self.external.fetch(user_id, range).await?;
        let manual = self.manual.fetch(user_id, range).await?;
        Ok(Box::new(MergeByDate {
            external: external.peekable(),
            manual: manual.peekable(),
        }))
    }
}

struct MergeByDate {
    external: Peekable<TransactionStream>,
    manual: Peekable<TransactionStream>,
}

impl Iterator for MergeByDate {
    type Item = Result<Transaction>;

    fn next(&mut self) -> Option<Self::Item> {
        // errors surface as soon as they are seen
        let take_external = match (self.external.peek(), self.manual.peek()) {
            (None, None) => return None,
            (Some(Err(_)), _) => true,
            (_, Some(Err(_))) => false,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(Ok(a)), Some(Ok(b))) => a.date <= b.date,
        };

        if take_external {
            self.external.next()
        } else {
            self.manual.next().map(|item| {
                item.map(|mut tx| {
                    tx.is_mock = true;
                    tx
                })
            })
        }
    }
}
