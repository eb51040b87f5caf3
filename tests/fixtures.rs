#![allow(dead_code)]

use recordkit::{
    AssociationOptions, Attributes, FieldRules, MemoryTransport, RecordSession, RecordType,
    Transport, TypeRegistry,
};
use serde_json::Value;
use std::sync::Arc;

pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture attributes must be an object, got {}", other),
    }
}

/// Person, Category, Post, Comment, Tag and PostTag with the usual blog associations:
///
/// - Post belongs to Person (as `author`, key `author_id`) and to Category
/// - Post has many Comment, and many Tag through PostTag
/// - Comment belongs to Post, PostTag belongs to Post and Tag
pub fn blog_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register(
            RecordType::new("Person")
                .url_root("/people")
                .validates(FieldRules::new("name").required()),
        )
        .register(RecordType::new("Category").url_root("/categories"))
        .register(
            RecordType::new("Post")
                .url_root("/posts")
                .validates(FieldRules::new("title").required()),
        )
        .register(RecordType::new("Comment").url_root("/comments"))
        .register(RecordType::new("Tag").url_root("/tags"))
        .register(RecordType::new("PostTag").url_root("/post_tags"));

    registry.declare_belongs_to(
        "Post",
        "Person",
        AssociationOptions::new().singular("Author").key("author_id"),
    );
    registry.declare_belongs_to("Post", "Category", AssociationOptions::new());
    registry.declare_has_many("Post", "Comment", AssociationOptions::new());
    registry.declare_has_many("Post", "Tag", AssociationOptions::new().through("PostTag"));
    registry.declare_belongs_to("Comment", "Post", AssociationOptions::new());
    registry.declare_belongs_to("PostTag", "Post", AssociationOptions::new());
    registry.declare_belongs_to("PostTag", "Tag", AssociationOptions::new());
    registry
}

pub fn session_with(registry: TypeRegistry) -> (RecordSession, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let shared: Arc<dyn Transport> = transport.clone();
    (RecordSession::from_shared(Arc::new(registry), shared), transport)
}

pub fn blog_session() -> (RecordSession, Arc<MemoryTransport>) {
    session_with(blog_registry())
}
