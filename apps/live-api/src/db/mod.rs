pub mod memory;
pub mod pg;
pub mod pool;
pub mod schema;
pub mod store;

pub use memory::MemorySessionStore;
pub use pg::PgSessionStore;
pub use store::{SessionFilter, SessionStore, StoreError, StreamAssignment};
