//! Integration tests for term and taxonomy deletion.

use taxon_db::test_fixtures::TestDatabase;
use taxon_db::{
    CreateTaxonomyRequest, CreateTermRequest, Database, Error, MoveEngine, MoveTermRequest,
    TaxonomyRepository, TermParentRef, TermRef, TermRepository, TermStatus,
};

async fn seed(db: &Database) {
    db.taxonomies
        .create_taxonomy(CreateTaxonomyRequest {
            code: "test".to_string(),
            url: None,
            extra_data: None,
        })
        .await
        .unwrap();
    for (parent, slug) in [(None, "a"), (Some("a"), "b"), (Some("a/b"), "c")] {
        let parent_ref = match parent {
            None => TermParentRef::taxonomy("test"),
            Some(p) => TermParentRef::path("test", p),
        };
        db.terms
            .create_term(CreateTermRequest::new(parent_ref, slug))
            .await
            .unwrap();
    }
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_delete_term_purges_subtree() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    seed(db).await;

    db.mover
        .delete_term(&TermRef::path("test", "a/b"), false)
        .await
        .unwrap();

    // The subtree rows are gone, the parent stays.
    assert!(db.terms.get_term_any_status("test", "a/b").await.unwrap().is_none());
    assert!(db
        .terms
        .get_term_any_status("test", "a/b/c")
        .await
        .unwrap()
        .is_none());
    assert!(db.terms.get_term("test", "a").await.unwrap().is_some());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_delete_term_with_history_retains_rows() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    seed(db).await;

    db.mover
        .delete_term(&TermRef::path("test", "a/b"), true)
        .await
        .unwrap();

    let b = db
        .terms
        .get_term_any_status("test", "a/b")
        .await
        .unwrap()
        .unwrap();
    let c = db
        .terms
        .get_term_any_status("test", "a/b/c")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b.status, TermStatus::Deleted);
    assert_eq!(c.status, TermStatus::Deleted);
    assert_eq!(b.busy_count, 0);

    // Alive lookups no longer see the subtree.
    assert!(db.terms.get_term("test", "a/b").await.unwrap().is_none());

    // The freed path can be reused.
    let fresh = db
        .terms
        .create_term(CreateTermRequest::new(TermParentRef::path("test", "a"), "b"))
        .await
        .unwrap();
    assert_eq!(fresh.path, "a/b");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_delete_busy_term_fails() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    seed(db).await;

    let c = db.terms.get_term("test", "a/b/c").await.unwrap().unwrap();
    db.locks.mark_busy(&[c.id], None).await.unwrap();

    let err = db
        .mover
        .delete_term(&TermRef::path("test", "a/b"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TermBusy(_)));
    assert!(db.terms.get_term("test", "a/b").await.unwrap().is_some());

    db.locks.unmark_busy(&[c.id]).await.unwrap();
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_delete_missing_term_not_found() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    seed(db).await;

    let err = db
        .mover
        .delete_term(&TermRef::path("test", "nope"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_recreated_path_resolves_over_historic_row() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    db.taxonomies
        .create_taxonomy(CreateTaxonomyRequest {
            code: "test".to_string(),
            url: None,
            extra_data: None,
        })
        .await
        .unwrap();
    db.terms
        .create_term(CreateTermRequest::new(TermParentRef::taxonomy("test"), "a"))
        .await
        .unwrap();

    // Free the path while a historic row keeps it.
    db.mover
        .move_term(MoveTermRequest {
            source: TermRef::path("test", "a"),
            destination: None,
            new_slug: Some("b".to_string()),
            keep_history: true,
        })
        .await
        .unwrap();

    let recreated = db
        .terms
        .create_term(CreateTermRequest::new(TermParentRef::taxonomy("test"), "a"))
        .await
        .unwrap();

    // Resolution must find the alive row, not the obsoleted one.
    let resolved = db.terms.get_term("test", "a").await.unwrap().unwrap();
    assert_eq!(resolved.id, recreated.id);

    db.mover
        .delete_term(&TermRef::path("test", "a"), false)
        .await
        .unwrap();
    assert!(db.terms.get_term("test", "a").await.unwrap().is_none());
    assert!(db.terms.get_term("test", "b").await.unwrap().is_some());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_delete_taxonomy_cascades_to_terms() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    seed(db).await;

    db.taxonomies.delete_taxonomy("test").await.unwrap();

    assert!(db.taxonomies.get_taxonomy("test").await.unwrap().is_none());
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM taxonomy_term")
        .fetch_one(&test_db.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_update_term_metadata() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    seed(db).await;

    let updated = db
        .terms
        .update_term(
            &TermRef::path("test", "a"),
            taxon_db::UpdateTermRequest {
                extra_data: Some(serde_json::json!({"title": "Alpha"})),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.extra_data, Some(serde_json::json!({"title": "Alpha"})));

    let fetched = db.terms.get_term("test", "a").await.unwrap().unwrap();
    assert_eq!(fetched.extra_data, updated.extra_data);

    test_db.cleanup().await;
}
