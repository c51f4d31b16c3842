pub mod connection;
mod memory;
mod postgres;
mod store;

pub use connection::{check_health, create_pool};
pub use memory::MemoryCatalogStore;
pub use postgres::PgCatalogStore;
pub use store::{CatalogStore, CatalogTx};
