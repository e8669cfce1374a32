pub mod in_memory;
pub mod postgres;

pub use in_memory::{FaultTarget, InMemoryCatalog};
pub use postgres::postgres_repositories;
