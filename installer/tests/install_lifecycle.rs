//! End-to-end installation runs against the in-memory platform.
//!
//! These tests drive `plan` + `Installer::install` over realistic batches and
//! check ordering, duplicate handling, and reference linking.

use serde_json::json;

use installer::core::catalog::SchemaCatalog;
use installer::core::planner::plan;
use installer::core::types::{FieldType, RecordId, resolved_reference};
use installer::install::{InstallProgress, Installer};
use installer::io::media::FallbackRotation;
use installer::io::platform::PlatformError;
use installer::test_support::{MemoryPlatform, ScriptedMedia, record, relation, schema};

#[tokio::test]
async fn flat_metadata_becomes_plain_text_field() {
    let platform = MemoryPlatform::new();
    let media = ScriptedMedia::default();
    let mut installer = Installer::connect(&platform, &media, FallbackRotation::default())
        .await
        .expect("connect");

    let records = serde_json::from_value(json!([
        {"type": "authors", "title": "Jane Doe", "metadata": {"bio": "Writer"}}
    ]))
    .expect("records");
    let plan = plan(vec![schema("Authors", Vec::new())], records, installer.catalog());
    let report = installer.install(plan, &mut |_| {}).await.expect("install");

    assert_eq!(report.schemas.created, 1);
    assert_eq!(report.records.created, 1);
    let stored = platform.record_by_title("Jane Doe").expect("stored");
    assert_eq!(stored.slug, "jane-doe");
    assert_eq!(stored.fields.len(), 1);
    let bio = &stored.fields[0];
    assert_eq!(bio.key, "bio");
    assert_eq!(bio.title, "Bio");
    assert_eq!(bio.field_type, FieldType::PlainText);
    assert!(bio.id.is_some());
}

/// Batch:
/// ```text
/// categories  (no relations)   <- Technology
/// posts       (category -> categories) <- Getting Started { category: "technology" }
/// ```
/// The post is listed first but must be created second, and its category is
/// linked through the batch index without a backend lookup.
#[tokio::test]
async fn in_batch_reference_resolves_without_lookup() {
    let platform = MemoryPlatform::new();
    let media = ScriptedMedia::default();
    let mut installer = Installer::connect(&platform, &media, FallbackRotation::default())
        .await
        .expect("connect");

    let plan = plan(
        vec![
            schema("Categories", Vec::new()),
            schema("Posts", vec![relation("category", "categories")]),
        ],
        vec![
            record("posts", "Getting Started", json!({"category": "technology"})),
            record("categories", "Technology", json!({})),
        ],
        installer.catalog(),
    );
    let mut events = Vec::new();
    let report = installer
        .install(plan, &mut |event| events.push(event.clone()))
        .await
        .expect("install");

    assert_eq!(
        platform.calls(),
        vec![
            "schema:Categories",
            "schema:Posts",
            "record:Technology",
            "record:Getting Started",
        ]
    );
    assert_eq!(platform.slug_lookups(), 0);

    let technology = platform.record_by_title("Technology").expect("technology");
    let post = platform.record_by_title("Getting Started").expect("post");
    let category = post.fields.iter().find(|f| f.key == "category").expect("category");
    assert_eq!(category.value, resolved_reference(&technology.id));
    assert_eq!(category.related_schema.as_deref(), Some("categories"));

    let updates = platform.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, post.id);
    assert_eq!(updates[0].1.fields.len(), 1);

    assert_eq!(report.references.updated, 1);
    assert!(report.references.unresolved.is_empty());
    assert!(matches!(
        events.last(),
        Some(InstallProgress::ReferencesUpdated { fields: 1, .. })
    ));
}

#[tokio::test]
async fn duplicate_slug_is_skipped_and_batch_continues() {
    let platform = MemoryPlatform::new();
    platform.fail_record(
        "Hello World",
        PlatformError::Rejected("slug already exists".to_string()),
    );
    platform.fail_record(
        "Broken",
        PlatformError::Rejected("title too long".to_string()),
    );
    let media = ScriptedMedia::default();
    let mut installer = Installer::connect(&platform, &media, FallbackRotation::default())
        .await
        .expect("connect");

    let plan = plan(
        vec![schema("Posts", Vec::new())],
        vec![
            record("posts", "Hello World", json!({})),
            record("posts", "Broken", json!({})),
            record("posts", "Second Post", json!({})),
        ],
        installer.catalog(),
    );
    let report = installer.install(plan, &mut |_| {}).await.expect("install");

    assert_eq!(report.records.created, 1);
    assert_eq!(report.records.skipped, 1);
    assert_eq!(report.records.failed, 1);
    assert_eq!(report.failures, vec!["Broken: rejected: title too long".to_string()]);
    assert!(platform.record_by_title("Second Post").is_some());
}

#[tokio::test]
async fn unresolvable_slug_is_left_unchanged() {
    let platform = MemoryPlatform::new();
    let media = ScriptedMedia::default();
    let mut installer = Installer::connect(&platform, &media, FallbackRotation::default())
        .await
        .expect("connect");

    let plan = plan(
        vec![schema("Posts", vec![relation("category", "categories")])],
        vec![
            record("posts", "A", json!({"category": "ghost"})),
            record("posts", "B", json!({"category": "ghost"})),
        ],
        installer.catalog(),
    );
    let report = installer.install(plan, &mut |_| {}).await.expect("install");

    assert_eq!(report.records.created, 2);
    assert!(!report.has_failures());
    assert_eq!(report.references.unresolved, vec!["ghost".to_string()]);
    assert_eq!(report.references.updated, 0);
    assert_eq!(platform.slug_lookups(), 1);
    assert!(platform.updates().is_empty());
    let stored = platform.record_by_title("B").expect("stored");
    assert_eq!(stored.fields[0].value, json!("ghost"));
}

#[tokio::test]
async fn existing_backend_record_is_linked() {
    let platform = MemoryPlatform::new();
    platform.seed_schema(schema("Authors", Vec::new()));
    let jane: RecordId = platform.seed_record("authors", "Jane Doe");
    let media = ScriptedMedia::default();
    let mut installer = Installer::connect(&platform, &media, FallbackRotation::default())
        .await
        .expect("connect");

    let plan = plan(
        vec![schema("Books", vec![relation("author", "authors")])],
        vec![record("books", "Dune Notes", json!({"author": "jane-doe"}))],
        installer.catalog(),
    );
    let report = installer.install(plan, &mut |_| {}).await.expect("install");

    assert_eq!(report.references.updated, 1);
    let stored = platform.record_by_title("Dune Notes").expect("stored");
    assert_eq!(stored.fields[0].value, resolved_reference(&jane));
}

#[tokio::test]
async fn update_failures_are_reported_without_changing_counts() {
    let platform = MemoryPlatform::new();
    platform.fail_updates(PlatformError::Rejected("locked".to_string()));
    let media = ScriptedMedia::default();
    let mut installer = Installer::connect(&platform, &media, FallbackRotation::default())
        .await
        .expect("connect");

    let plan = plan(
        vec![
            schema("Categories", Vec::new()),
            schema("Posts", vec![relation("category", "categories")]),
        ],
        vec![
            record("categories", "News", json!({})),
            record("posts", "Launch", json!({"category": "news"})),
        ],
        installer.catalog(),
    );
    let report = installer.install(plan, &mut |_| {}).await.expect("install");

    assert_eq!(report.records.created, 2);
    assert_eq!(report.records.failed, 0);
    assert_eq!(report.references.update_failures, 1);
    assert_eq!(report.failures, vec!["Launch: rejected: locked".to_string()]);
}

#[tokio::test]
async fn unavailable_platform_aborts_the_run() {
    let platform = MemoryPlatform::new();
    platform.fail_schema(
        "Posts",
        PlatformError::Unavailable("connection refused".to_string()),
    );
    let media = ScriptedMedia::default();
    let mut installer = Installer::new(
        &platform,
        &media,
        SchemaCatalog::default(),
        FallbackRotation::default(),
    );

    let plan = plan(
        vec![schema("Posts", Vec::new()), schema("Pages", Vec::new())],
        vec![record("posts", "A", json!({}))],
        installer.catalog(),
    );
    let result = installer.install(plan, &mut |_| {}).await;

    assert!(matches!(result, Err(PlatformError::Unavailable(_))));
    assert_eq!(platform.calls(), vec!["schema:Posts"]);
}
