//! Infrastructure implementations for chatloom.
//!
//! Provides the SQLite-backed `ChatStore` and file-based runtime
//! configuration loading. Depends on `chatloom-core` only for the port
//! traits it implements.

pub mod config;
pub mod sqlite;

pub use config::load_runtime_config;
pub use sqlite::chat::SqliteChatStore;
pub use sqlite::pool::DatabasePool;
