pub mod error;
pub mod value;

pub use error::{RecordError, Result, TransportError};
pub use value::{
    Attributes, RESERVED_PREFIX, Resolvable, deep_equal, id_to_string, is_reserved, is_truthy,
    lcfirst, to_camel_case, to_snake_case, ucfirst,
};
