pub mod outcome;
pub mod plan;
pub mod reconciler;
pub mod upsert_engine;

pub use outcome::{
    Dependency, EntityKind, EventRef, ReconcileReport, StatementKind, WriteOutcome, WriteStatus,
};
pub use reconciler::Reconciler;
pub use upsert_engine::{CatalogRepositories, UpsertEngine};
