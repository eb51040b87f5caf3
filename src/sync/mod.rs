//! Record session and the save / fetch / destroy operations.

mod cascade;
mod fetch;
mod materialize;
pub mod session;
pub mod settle;

pub use session::RecordSession;
pub use settle::settle_all;
