//! Integration tests for taxonomy and term creation.
//!
//! Covers parent-ref resolution, slug normalization and collision policy,
//! path/level invariants, and the busy/inactive parent rejections.

use serde_json::json;
use taxon_db::test_fixtures::TestDatabase;
use taxon_db::{
    CreateTaxonomyRequest, CreateTermRequest, Error, MoveEngine, MoveTermRequest, SlugPolicy,
    TaxonomyRepository, TermParentRef, TermRef, TermRepository, TermStatus,
};

async fn create_taxonomy(db: &taxon_db::Database, code: &str) {
    db.taxonomies
        .create_taxonomy(CreateTaxonomyRequest {
            code: code.to_string(),
            url: None,
            extra_data: None,
        })
        .await
        .expect("Failed to create taxonomy");
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_create_taxonomy_duplicate_code_rejected() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    create_taxonomy(db, "countries").await;
    let err = db
        .taxonomies
        .create_taxonomy(CreateTaxonomyRequest {
            code: "countries".to_string(),
            url: None,
            extra_data: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateCode(code) if code == "countries"));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_create_term_computes_path_and_level() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    create_taxonomy(db, "countries").await;
    let europe = db
        .terms
        .create_term(CreateTermRequest::new(
            TermParentRef::taxonomy("countries"),
            "Europe",
        ))
        .await
        .unwrap();
    assert_eq!(europe.path, "europe");
    assert_eq!(europe.level, 0);
    assert_eq!(europe.parent_id, None);
    assert_eq!(europe.status, TermStatus::Alive);

    let cz = db
        .terms
        .create_term(CreateTermRequest::new(
            TermParentRef::path("countries", "europe"),
            "Czech Republic",
        ))
        .await
        .unwrap();
    assert_eq!(cz.path, "europe/czech-republic");
    assert_eq!(cz.level, 1);
    assert_eq!(cz.parent_id, Some(europe.id));
    assert_eq!(cz.slug(), "czech-republic");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_create_term_by_parent_id_and_full_path() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    create_taxonomy(db, "countries").await;
    let europe = db
        .terms
        .create_term(CreateTermRequest::new(
            TermParentRef::taxonomy("countries"),
            "europe",
        ))
        .await
        .unwrap();

    let by_id = db
        .terms
        .create_term(CreateTermRequest::new(TermParentRef::Term(europe.id), "cz"))
        .await
        .unwrap();
    assert_eq!(by_id.path, "europe/cz");

    let by_full_path = db
        .terms
        .create_term(CreateTermRequest::new(
            TermParentRef::FullPath("countries/europe/cz".to_string()),
            "prague",
        ))
        .await
        .unwrap();
    assert_eq!(by_full_path.path, "europe/cz/prague");
    assert_eq!(by_full_path.level, 2);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_create_term_slug_collision_disambiguates() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    create_taxonomy(db, "t").await;
    let first = db
        .terms
        .create_term(CreateTermRequest::new(TermParentRef::taxonomy("t"), "news"))
        .await
        .unwrap();
    let second = db
        .terms
        .create_term(CreateTermRequest::new(TermParentRef::taxonomy("t"), "news"))
        .await
        .unwrap();
    let third = db
        .terms
        .create_term(CreateTermRequest::new(TermParentRef::taxonomy("t"), "news"))
        .await
        .unwrap();

    assert_eq!(first.path, "news");
    assert_eq!(second.path, "news-1");
    assert_eq!(third.path, "news-2");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_create_term_slug_collision_rejected_by_policy() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    create_taxonomy(db, "t").await;
    db.terms
        .create_term(CreateTermRequest::new(TermParentRef::taxonomy("t"), "news"))
        .await
        .unwrap();

    let err = db
        .terms
        .create_term(
            CreateTermRequest::new(TermParentRef::taxonomy("t"), "news")
                .with_slug_policy(SlugPolicy::Reject),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateSlug(path) if path == "news"));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_create_term_under_busy_parent_fails() {
    // Creating a/d while a has busy_count = 1 must fail with InactiveParent.
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    create_taxonomy(db, "test").await;
    let a = db
        .terms
        .create_term(CreateTermRequest::new(TermParentRef::taxonomy("test"), "a"))
        .await
        .unwrap();

    db.locks.mark_busy(&[a.id], None).await.unwrap();

    let err = db
        .terms
        .create_term(CreateTermRequest::new(
            TermParentRef::path("test", "a"),
            "d",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InactiveParent(path) if path == "a"));

    db.locks.unmark_busy(&[a.id]).await.unwrap();
    let err_gone = db
        .terms
        .create_term(CreateTermRequest::new(
            TermParentRef::path("test", "a"),
            "d",
        ))
        .await;
    assert!(err_gone.is_ok());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_create_term_under_missing_parent_not_found() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    create_taxonomy(db, "test").await;
    let err = db
        .terms
        .create_term(CreateTermRequest::new(
            TermParentRef::path("test", "nope"),
            "child",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = db
        .terms
        .create_term(CreateTermRequest::new(
            TermParentRef::taxonomy("missing-taxonomy"),
            "child",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_create_under_recreated_parent() {
    // A historic row sharing the parent path must not shadow the alive,
    // re-created parent.
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    create_taxonomy(db, "test").await;
    db.terms
        .create_term(CreateTermRequest::new(TermParentRef::taxonomy("test"), "a"))
        .await
        .unwrap();
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

    let child = db
        .terms
        .create_term(CreateTermRequest::new(
            TermParentRef::path("test", "a"),
            "child",
        ))
        .await
        .unwrap();
    assert_eq!(child.path, "a/child");
    assert_eq!(child.parent_id, Some(recreated.id));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_term_metadata_round_trip() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    create_taxonomy(db, "test").await;
    let created = db
        .terms
        .create_term(
            CreateTermRequest::new(TermParentRef::taxonomy("test"), "a")
                .with_extra_data(json!({"title": {"en": "A"}})),
        )
        .await
        .unwrap();

    let fetched = db.terms.get_term("test", "a").await.unwrap().unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.extra_data, Some(json!({"title": {"en": "A"}})));

    test_db.cleanup().await;
}
