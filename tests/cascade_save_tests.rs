/// Cascading save tests
///
/// Ordering of to-one dependencies, the owner commit and to-many dependents, settlement of
/// concurrent siblings, and duplicate-write avoidance.
/// Run with: cargo test --test cascade_save_tests
#[path = "fixtures.rs"]
mod fixtures;

use fixtures::{attrs, blog_registry, blog_session, session_with};
use http::Method;
use recordkit::{AssociationOptions, RecordError, SyncOptions, TransportError};
use serde_json::json;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_new_belongs_to_is_saved_before_owner() {
    let (session, transport) = blog_session();
    let author = session
        .new_record("Person", Some(attrs(json!({"name": "Ann"}))))
        .unwrap();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    session.add_belongs_to(post, "Author", author).unwrap();

    session.save(post, None, SyncOptions::new()).await.unwrap();

    let requests = transport.requests();
    let urls: Vec<_> = requests.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["/people", "/posts"]);

    let author_id = session.id(author).unwrap().unwrap();
    assert_eq!(requests[1].data.as_ref().unwrap()["author_id"], author_id);
    assert_eq!(session.get(post, "author_id").unwrap(), Some(author_id));
    assert!(!session.has_changed(post, None).unwrap());
    assert!(!session.has_changed(author, None).unwrap());
}

#[tokio::test]
async fn test_belongs_to_failure_prevents_commit() {
    let (session, transport) = blog_session();
    transport.fail(Method::POST, "/people", 500);
    let author = session
        .new_record("Person", Some(attrs(json!({"name": "Ann"}))))
        .unwrap();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    session.add_belongs_to(post, "Author", author).unwrap();

    let err = session.save(post, None, SyncOptions::new()).await.unwrap_err();

    match err {
        RecordError::Transport(TransportError::Status { status, .. }) => assert_eq!(status, 500),
        other => panic!("unexpected error: {other}"),
    }
    assert!(transport.requests_matching(&Method::POST, "/posts").is_empty());
    assert!(session.is_new(post).unwrap());
}

#[tokio::test]
async fn test_two_belongs_to_complete_before_owner() {
    let (session, transport) = blog_session();
    transport.delay("/people", Duration::from_millis(40));
    let author = session
        .new_record("Person", Some(attrs(json!({"name": "Ann"}))))
        .unwrap();
    let category = session
        .new_record("Category", Some(attrs(json!({"label": "news"}))))
        .unwrap();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    session.add_belongs_to(post, "Author", author).unwrap();
    session.add_belongs_to(post, "Category", category).unwrap();

    session.save(post, None, SyncOptions::new()).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].url, "/posts");
    let body = requests[2].data.as_ref().unwrap();
    assert_eq!(body["author_id"], session.id(author).unwrap().unwrap());
    assert_eq!(body["category_id"], session.id(category).unwrap().unwrap());
}

#[tokio::test]
async fn test_sibling_failure_settles_without_waiting_for_slow_sibling() {
    let (session, transport) = blog_session();
    transport.delay("/people", Duration::from_millis(400));
    transport.fail(Method::POST, "/categories", 503);
    let author = session
        .new_record("Person", Some(attrs(json!({"name": "Ann"}))))
        .unwrap();
    let category = session
        .new_record("Category", Some(attrs(json!({"label": "news"}))))
        .unwrap();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    session.add_belongs_to(post, "Author", author).unwrap();
    session.add_belongs_to(post, "Category", category).unwrap();

    let started = Instant::now();
    let err = session.save(post, None, SyncOptions::new()).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_millis(300));
    assert!(matches!(
        err,
        RecordError::Transport(TransportError::Status { status: 503, .. })
    ));
    assert!(session.is_new(author).unwrap());
    assert!(session.is_new(category).unwrap());

    // the slower sibling still completes its write
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!session.is_new(author).unwrap());
    assert_eq!(transport.requests_matching(&Method::POST, "/people").len(), 1);
    assert!(transport.requests_matching(&Method::POST, "/posts").is_empty());
}

#[tokio::test]
async fn test_shared_dependency_is_written_once_before_both_owners() {
    let mut registry = blog_registry();
    registry.declare_belongs_to("Category", "Person", AssociationOptions::new());
    let (session, transport) = session_with(registry);
    transport.delay("/people", Duration::from_millis(30));

    let person = session
        .new_record("Person", Some(attrs(json!({"name": "Ann"}))))
        .unwrap();
    let category = session
        .new_record("Category", Some(attrs(json!({"label": "news"}))))
        .unwrap();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    session.add_belongs_to(post, "Author", person).unwrap();
    session.add_belongs_to(post, "Category", category).unwrap();
    session.add_belongs_to(category, "Person", person).unwrap();

    session.save(post, None, SyncOptions::new()).await.unwrap();

    let requests = transport.requests();
    let urls: Vec<_> = requests.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["/people", "/categories", "/posts"]);
    assert_eq!(transport.items("/people").len(), 1);

    let person_id = session.id(person).unwrap().unwrap();
    let category_id = session.id(category).unwrap().unwrap();
    assert_eq!(requests[1].data.as_ref().unwrap()["person_id"], person_id);
    let post_body = requests[2].data.as_ref().unwrap();
    assert_eq!(post_body["author_id"], person_id);
    assert_eq!(post_body["category_id"], category_id);
}

#[tokio::test]
async fn test_mutually_dependent_siblings_settle() {
    let mut registry = blog_registry();
    registry.declare_belongs_to("Category", "Person", AssociationOptions::new());
    registry.declare_belongs_to("Person", "Category", AssociationOptions::new());
    let (session, transport) = session_with(registry);

    let person = session
        .new_record("Person", Some(attrs(json!({"name": "Ann"}))))
        .unwrap();
    let category = session
        .new_record("Category", Some(attrs(json!({"label": "news"}))))
        .unwrap();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    session.add_belongs_to(post, "Author", person).unwrap();
    session.add_belongs_to(post, "Category", category).unwrap();
    session.add_belongs_to(category, "Person", person).unwrap();
    session.add_belongs_to(person, "Category", category).unwrap();

    tokio::time::timeout(
        Duration::from_secs(2),
        session.save(post, None, SyncOptions::new()),
    )
    .await
    .expect("save settled")
    .unwrap();

    assert_eq!(transport.requests_matching(&Method::POST, "/people").len(), 1);
    assert_eq!(transport.requests_matching(&Method::POST, "/categories").len(), 1);
    let posts = transport.requests_matching(&Method::POST, "/posts");
    assert_eq!(posts.len(), 1);
    let post_body = posts[0].data.as_ref().unwrap();
    assert_eq!(post_body["author_id"], session.id(person).unwrap().unwrap());
    assert_eq!(post_body["category_id"], session.id(category).unwrap().unwrap());
}

#[tokio::test]
async fn test_dependency_without_identifier_is_cascade_error() {
    let (session, transport) = blog_session();
    transport.respond(Method::POST, "/people", json!({"name": "Ann"}));
    let author = session
        .new_record("Person", Some(attrs(json!({"name": "Ann"}))))
        .unwrap();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    session.add_belongs_to(post, "Author", author).unwrap();

    let err = session.save(post, None, SyncOptions::new()).await.unwrap_err();

    assert!(err.is_cascade());
    match err {
        RecordError::Cascade { type_name, .. } => assert_eq!(type_name, "Person"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(transport.requests_matching(&Method::POST, "/posts").is_empty());
}

#[tokio::test]
async fn test_invalid_dependency_blocks_everything() {
    let (session, transport) = blog_session();
    let author = session.new_record("Person", None).unwrap();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    session.add_belongs_to(post, "Author", author).unwrap();

    let err = session.save(post, None, SyncOptions::new()).await.unwrap_err();

    assert!(err.validation_errors().unwrap().contains("name"));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_persisted_belongs_to_only_reflects_identifier() {
    let (session, transport) = blog_session();
    let author = session
        .new_record("Person", Some(attrs(json!({"id": 7, "name": "Ann"}))))
        .unwrap();
    session.set(author, "name", json!("Annabel")).unwrap();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    session.add_belongs_to(post, "Author", author).unwrap();

    session.save(post, None, SyncOptions::new()).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].data.as_ref().unwrap()["author_id"], json!(7));
    assert!(session.has_changed(author, Some("name")).unwrap());
}

#[tokio::test]
async fn test_new_has_many_saved_after_owner() {
    let (session, transport) = blog_session();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    let first = session
        .add_has_many(post, "Comment", None, Some(attrs(json!({"body": "first"}))))
        .unwrap();
    let second = session
        .add_has_many(post, "Comment", None, Some(attrs(json!({"body": "second"}))))
        .unwrap();

    session.save(post, None, SyncOptions::new()).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].url, "/posts");
    assert_eq!(transport.requests_matching(&Method::POST, "/comments").len(), 2);

    let post_id = session.id(post).unwrap().unwrap();
    for comment in [first, second] {
        assert!(!session.is_new(comment).unwrap());
        assert_eq!(session.get(comment, "post_id").unwrap(), Some(post_id.clone()));
    }
    assert_eq!(transport.items("/comments").len(), 2);
}

#[tokio::test]
async fn test_unchanged_has_many_is_not_written() {
    let (session, transport) = blog_session();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    let first = session
        .add_has_many(post, "Comment", None, Some(attrs(json!({"body": "first"}))))
        .unwrap();
    session
        .add_has_many(post, "Comment", None, Some(attrs(json!({"body": "second"}))))
        .unwrap();
    session.save(post, None, SyncOptions::new()).await.unwrap();
    transport.clear_requests();

    session.save(post, None, SyncOptions::new()).await.unwrap();
    assert!(transport.requests_matching(&Method::PUT, "/comments").is_empty());
    assert!(transport.requests_matching(&Method::POST, "/comments").is_empty());

    session.set(first, "body", json!("edited")).unwrap();
    session.save(post, None, SyncOptions::new()).await.unwrap();

    let updates = transport.requests_matching(&Method::PUT, "/comments");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].data, Some(json!({"body": "edited"})));
}

#[tokio::test]
async fn test_has_many_failure_rejects_without_rollback() {
    let (session, transport) = blog_session();
    transport.fail(Method::POST, "/comments", 422);
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    session
        .add_has_many(post, "Comment", None, Some(attrs(json!({"body": "first"}))))
        .unwrap();

    let err = session.save(post, None, SyncOptions::new()).await.unwrap_err();

    assert!(matches!(
        err,
        RecordError::Transport(TransportError::Status { status: 422, .. })
    ));
    assert!(!session.is_new(post).unwrap());
    assert_eq!(transport.items("/posts").len(), 1);
}

#[tokio::test]
async fn test_has_many_through_saves_join_and_target() {
    let (session, transport) = blog_session();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    let tag = session
        .new_record("Tag", Some(attrs(json!({"label": "rust"}))))
        .unwrap();
    let join = session.add_has_many(post, "Tag", Some(tag), None).unwrap();

    session.save(post, None, SyncOptions::new()).await.unwrap();

    let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec!["/posts", "/tags", "/post_tags"]);

    let stored_join = transport.items("/post_tags").pop().unwrap();
    assert_eq!(stored_join["post_id"], session.id(post).unwrap().unwrap());
    assert_eq!(stored_join["tag_id"], session.id(tag).unwrap().unwrap());
    assert!(!session.is_new(join).unwrap());
}

#[tokio::test]
async fn test_cyclic_graph_is_written_once() {
    let (session, transport) = blog_session();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    let comment = session
        .add_has_many(post, "Comment", None, Some(attrs(json!({"body": "first"}))))
        .unwrap();
    assert_eq!(session.belongs_to(comment, "post").unwrap(), Some(post));

    session.save(comment, None, SyncOptions::new()).await.unwrap();

    assert_eq!(transport.requests_matching(&Method::POST, "/posts").len(), 1);
    assert_eq!(transport.requests_matching(&Method::POST, "/comments").len(), 1);
    assert_eq!(transport.requests().len(), 2);
    assert_eq!(
        session.get(comment, "post_id").unwrap(),
        session.id(post).unwrap()
    );
}

#[tokio::test]
async fn test_released_dependency_is_skipped() {
    let (session, transport) = blog_session();
    let author = session
        .new_record("Person", Some(attrs(json!({"name": "Ann"}))))
        .unwrap();
    let post = session
        .new_record("Post", Some(attrs(json!({"title": "Hello"}))))
        .unwrap();
    session.add_belongs_to(post, "Author", author).unwrap();
    session.release(author).unwrap();

    session.save(post, None, SyncOptions::new()).await.unwrap();

    assert_eq!(transport.requests().len(), 1);
    assert_eq!(transport.requests()[0].url, "/posts");
}
