//! Everything needed to declare record types and drive a session.
//!
//! ```
//! use recordkit::prelude::*;
//!
//! let post = RecordType::new("Post")
//!     .url_root("/posts")
//!     .validates(FieldRules::new("title").required());
//! assert_eq!(post.name(), "Post");
//! ```

pub use crate::core::{Attributes, RecordError, Resolvable, Result};
pub use crate::record::{InitOptions, RecordKey};
pub use crate::schema::{AssociationOptions, RecordType, TypeRegistry};
pub use crate::sync::RecordSession;
pub use crate::transport::{MemoryTransport, SyncOptions, Transport};
pub use crate::validation::{ErrorMessage, FieldRules};
