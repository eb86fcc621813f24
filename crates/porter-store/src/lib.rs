//! porter-store — the local object store: record formats, storage backends,
//! and the pack-file fast path.

pub mod memory;
pub mod pack;
pub mod proxy;
pub mod sqlite;
pub mod store;
pub mod tree;

pub use memory::MemoryStore;
pub use pack::PackSet;
pub use proxy::{proxy_object_id, ProxyRecord};
pub use sqlite::SqliteStore;
pub use store::{Family, Put, Store, StoreError, WriteBatch};
pub use tree::{Tree, TreeEntry};
