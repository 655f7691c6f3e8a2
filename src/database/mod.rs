pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod query_builder;
pub mod repository;
pub mod schema;
pub mod storage;

pub use manager::{Connector, DatabaseError, DatabaseManager};
pub use memory::{MemoryConnector, MemoryStorage};
pub use postgres::{PgConnector, PgStorage};
pub use repository::{TenantRepository, Unscoped};
pub use storage::{Row, Storage};
