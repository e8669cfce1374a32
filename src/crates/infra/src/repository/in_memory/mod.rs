pub mod catalog;

pub use catalog::{FaultTarget, InMemoryCatalog};
