//! MU Store — on-disk graph database and graph builder
//!
//! Owns the `.mubase` SQLite file and every mutation to it. A single
//! process holds the write lock; read-only handles may coexist.

pub mod builder;
pub mod lock;
pub mod schema;
pub mod store;


pub use builder::{BuildOutput, GraphBuilder};
pub use lock::LockFile;
pub use store::{ChangeSet, GraphStore, StoreStats};
