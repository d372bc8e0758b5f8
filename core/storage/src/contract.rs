//! Behavioral checks every stateful adapter must pass.

use crate::adapter::StorageAdapter;
use crate::session::Session;
use mdstore_common::Error;

/// Run every check against a fresh adapter, authorized by `session`.
pub(crate) async fn check_all(adapter: &dyn StorageAdapter, session: &Session) {
    check_empty_lists(adapter, session).await;
    check_round_trip(adapter, session).await;
    check_overwrite(adapter, session).await;
    check_namespaces_independent(adapter, session).await;
    check_missing_record(adapter, session).await;
}

async fn check_empty_lists(adapter: &dyn StorageAdapter, session: &Session) {
    assert!(adapter.list_documents(session).await.unwrap().is_empty());
    assert!(adapter.list_stylesheets(session).await.unwrap().is_empty());
}

async fn check_round_trip(adapter: &dyn StorageAdapter, session: &Session) {
    let content = "# Title\n\nSome *markdown* with ünïcödé.";

    adapter.save_document(session, "round-trip", content).await.unwrap();
    let doc = adapter.get_document(session, "round-trip").await.unwrap();

    assert_eq!(doc.name, "round-trip");
    assert_eq!(doc.text, content);
}

async fn check_overwrite(adapter: &dyn StorageAdapter, session: &Session) {

    adapter.save_document(session, "draft", "first").await.unwrap();
    adapter.save_document(session, "draft", "second").await.unwrap();

    let doc = adapter.get_document(session, "draft").await.unwrap();
    assert_eq!(doc.text, "second");

    let drafts = adapter
        .list_documents(session)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.name == "draft")
        .count();
    assert_eq!(drafts, 1);
}

async fn check_namespaces_independent(adapter: &dyn StorageAdapter, session: &Session) {

    adapter.save_document(session, "shared-name", "doc").await.unwrap();
    let err = adapter
        .get_stylesheet(session, "shared-name")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(!adapter
        .list_stylesheets(session)
        .await
        .unwrap()
        .iter()
        .any(|r| r.name == "shared-name"));

    adapter.save_stylesheet(session, "shared-name", "css").await.unwrap();
    assert_eq!(
        adapter.get_document(session, "shared-name").await.unwrap().text,
        "doc"
    );
    assert_eq!(
        adapter.get_stylesheet(session, "shared-name").await.unwrap().text,
        "css"
    );
}

async fn check_missing_record(adapter: &dyn StorageAdapter, session: &Session) {
    let err = adapter.get_document(session, "never-saved").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
