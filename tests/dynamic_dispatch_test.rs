mod common;

use common::{coffee_request, date, tx};
use pactkeeper::domain::payment::ChargeResult;
use pactkeeper::domain::ports::{
    ContractStoreBox, OrganizationDirectoryBox, PaymentExecutorBox, TransactionFeedBox,
};
use pactkeeper::domain::transaction::DateRange;
use pactkeeper::infrastructure::in_memory::{
    InMemoryContractStore, InMemoryOrganizationDirectory, InMemoryTransactionFeed,
};
use pactkeeper::infrastructure::payments::SimulatedPaymentExecutor;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_ports_as_trait_objects() {
    let contract_store: ContractStoreBox = Box::new(InMemoryContractStore::new());
    let feed: TransactionFeedBox = Box::new(InMemoryTransactionFeed::new(vec![tx(
        7,
        "t1",
        "COFFEE",
        dec!(4.50),
        "2026-03-02",
    )]));
    let payments: PaymentExecutorBox = Box::new(SimulatedPaymentExecutor::new());
    let directory: OrganizationDirectoryBox = Box::new(InMemoryOrganizationDirectory::new(vec![]));

    // Verify Send + Sync by spawning tasks
    let store_handle = tokio::spawn(async move {
        let terms = coffee_request(7).validate(None).unwrap();
        let contract = contract_store
            .create(terms, chrono::Utc::now())
            .await
            .unwrap();
        contract_store.get(contract.id).await.unwrap().unwrap()
    });

    let feed_handle = tokio::spawn(async move {
        let range = DateRange::new(date("2026-03-01"), date("2026-03-31")).unwrap();
        feed.fetch(7, range).await.unwrap().count()
    });

    let contract = store_handle.await.unwrap();
    assert_eq!(contract.user_id, 7);
    assert_eq!(feed_handle.await.unwrap(), 1);

    let payment_handle = tokio::spawn(async move {
        let request =
            pactkeeper::domain::payment::ChargeRequest::for_contract(&contract, None, 1_000)
                .unwrap();
        payments.charge(&request).await
    });
    assert!(matches!(
        payment_handle.await.unwrap(),
        ChargeResult::Charged { .. }
    ));

    let directory_handle = tokio::spawn(async move { directory.resolve(1).await.unwrap() });
    assert!(directory_handle.await.unwrap().is_none());
}
