/// Change tracking tests
///
/// Snapshot baselines, changed-field detection and the sync points that reset them.
/// Run with: cargo test --test change_tracking_tests
#[path = "fixtures.rs"]
mod fixtures;

use fixtures::{attrs, blog_session};
use recordkit::{FieldChange, SyncOptions};
use serde_json::json;

#[test]
fn test_constructed_record_has_no_changes() {
    let (session, _) = blog_session();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello", "views": 3}))))
        .unwrap();

    assert!(!session.has_changed(post, None).unwrap());
    assert!(session.changed_attributes(post, None).unwrap().is_empty());
    assert_eq!(session.previous(post, "title").unwrap(), Some(json!("Hello")));
}

#[test]
fn test_mutation_is_reported() {
    let (session, _) = blog_session();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello", "views": 3}))))
        .unwrap();

    session.set(post, "title", json!("Bye")).unwrap();
    session.set(post, "views", json!(3.0)).unwrap();

    let changed = session.changed_attributes(post, None).unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed.get("title"), Some(&FieldChange::Set(json!("Bye"))));
    assert!(session.has_changed(post, Some("title")).unwrap());
    assert!(!session.has_changed(post, Some("views")).unwrap());
    assert_eq!(session.previous(post, "title").unwrap(), Some(json!("Hello")));
}

#[test]
fn test_removed_field_reported_only_without_target() {
    let (session, _) = blog_session();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello", "draft": true}))))
        .unwrap();
    session.with_record_mut(post, |record| record.remove("draft")).unwrap();

    let changed = session.changed_attributes(post, None).unwrap();
    assert_eq!(changed.get("draft"), Some(&FieldChange::Removed));
    assert!(changed.to_payload().is_empty());

    let target = attrs(json!({"title": "Other"}));
    let compared = session.changed_attributes(post, Some(&target)).unwrap();
    assert_eq!(compared.fields().collect::<Vec<_>>(), vec!["title"]);
}

#[test]
fn test_reserved_fields_are_not_tracked() {
    let (session, _) = blog_session();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();

    session.set(post, "$selected", json!(true)).unwrap();
    session
        .set(post, "meta", json!({"$hash": "x", "lang": "en"}))
        .unwrap();
    session.with_record_mut(post, |record| record.mark_synced()).unwrap();
    session
        .set(post, "meta", json!({"$hash": "y", "lang": "en"}))
        .unwrap();

    assert!(!session.has_changed(post, None).unwrap());
    assert!(!session.to_json(post).unwrap().contains_key("$selected"));
}

#[tokio::test]
async fn test_save_resets_baseline() {
    let (session, _) = blog_session();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    session.set(post, "body", json!("text")).unwrap();

    session.save(post, None, SyncOptions::new()).await.unwrap();

    assert!(!session.is_new(post).unwrap());
    assert!(!session.has_changed(post, None).unwrap());
    assert!(session.changed_attributes(post, None).unwrap().is_empty());
    assert!(session.with_record(post, |record| record.synced_at().is_some()).unwrap());
}

#[tokio::test]
async fn test_update_sends_only_changed_fields() {
    let (session, transport) = blog_session();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello", "body": "text"}))))
        .unwrap();
    session.save(post, None, SyncOptions::new()).await.unwrap();
    transport.clear_requests();

    session
        .save(post, Some(attrs(json!({"title": "Renamed"}))), SyncOptions::new())
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, http::Method::PUT);
    assert_eq!(requests[0].url, "/posts/1");
    assert_eq!(requests[0].data, Some(json!({"title": "Renamed"})));
    assert!(!session.has_changed(post, None).unwrap());
}

#[tokio::test]
async fn test_fetch_resets_baseline() {
    let (session, transport) = blog_session();
    transport.seed("/posts", vec![json!({"id": 4, "title": "Seeded"})]);

    let post = session.new_record("Post", None).unwrap();
    session.with_record_mut(post, |record| record.set_id(json!(4))).unwrap();
    session.set(post, "title", json!("Local edit")).unwrap();

    session.fetch(post, SyncOptions::new()).await.unwrap();

    assert_eq!(session.get(post, "title").unwrap(), Some(json!("Seeded")));
    assert!(!session.has_changed(post, None).unwrap());
}

#[tokio::test]
async fn test_save_field_assigns_and_saves() {
    let (session, transport) = blog_session();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    session.save(post, None, SyncOptions::new()).await.unwrap();

    session
        .save_field(post, "title", json!("Field save"), SyncOptions::new())
        .await
        .unwrap();

    assert_eq!(
        transport.stored("/posts", "1").unwrap()["title"],
        json!("Field save")
    );
    assert!(!session.has_changed(post, None).unwrap());
}
