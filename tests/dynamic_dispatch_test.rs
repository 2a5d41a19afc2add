use bankcore::domain::account::{Account, AccountType};
use bankcore::domain::ports::{ChangeSet, RecordStoreBox, Sequence};
use bankcore::infrastructure::in_memory::InMemoryRecordStore;
use chrono::Utc;

#[tokio::test]
async fn test_store_as_trait_object() {
    let store: RecordStoreBox = Box::new(InMemoryRecordStore::new());

    // Verify Send + Sync by moving the boxed store into a spawned task
    let handle = tokio::spawn(async move {
        let id = store.next_id(Sequence::Account).await.unwrap();
        let mut changes = ChangeSet::default();
        changes
            .accounts
            .insert(id, Account::new(id, 1, AccountType::Savings, Utc::now()));
        store.apply(changes).await.unwrap();
        store.account(id).await.unwrap().unwrap()
    });

    let account = handle.await.unwrap();
    assert_eq!(account.id, 1);
    assert_eq!(account.customer_id, 1);
}
