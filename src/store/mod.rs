//! Persistence layer — leads, messages, and tasks.

pub mod libsql_backend;
pub mod migrations;
pub mod model;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::NurtureStore;
