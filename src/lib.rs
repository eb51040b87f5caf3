// ============================================================================
// recordkit Library
// ============================================================================

pub mod core;
pub mod connection;
pub mod record;
pub mod schema;
pub mod sync;
pub mod transport;
pub mod validation;
pub mod prelude;

// Re-export main types for convenience
pub use core::{Attributes, RecordError, Resolvable, Result, TransportError};
pub use record::{ChangeSet, FieldChange, FieldFilters, InitOptions, Record, RecordKey, Snapshot};
pub use schema::{AssociationKind, AssociationOptions, RecordType, TypeRegistry};
pub use sync::RecordSession;
pub use validation::{ErrorMap, ErrorMessage, FieldRules, Rule};

// Re-export transport API
pub use connection::ClientConfig;
pub use transport::{
    HttpTransport, MemoryTransport, Operation, SyncOptions, SyncRequest, SyncResponse, Transport,
};

/// Builds a session over an HTTP backend
///
/// # Examples
///
/// ```
/// use recordkit::{ClientConfig, RecordType, TypeRegistry};
///
/// # fn main() -> recordkit::Result<()> {
/// let mut registry = TypeRegistry::new();
/// registry.register(RecordType::new("Post").url_root("/posts"));
///
/// let session = recordkit::connect(registry, ClientConfig::new("http://localhost:8080"))?;
/// let post = session.new_record("Post", None)?;
/// assert_eq!(session.url(post)?, "/posts");
/// # Ok(())
/// # }
/// ```
pub fn connect(registry: TypeRegistry, config: ClientConfig) -> Result<RecordSession> {
    Ok(RecordSession::new(registry, HttpTransport::new(config)?))
}
