//! Bulletin persistence, lifecycle transitions and batch generation.
//!
//! The engine talks to the outside world only through [`GradebookSource`],
//! [`BulletinRepository`] and [`BulletinDispatcher`].

pub mod batch;
pub mod domain;
pub mod lifecycle;
pub mod repository;

#[cfg(test)]
mod tests;

pub use batch::{
    BatchError, BatchFailure, BatchGenerationOrchestrator, BatchReport, BulkFailure,
    BulkOperationReport, CancellationFlag, GenerationOptions, GenerationRequest,
    GenerationScope, StudentFailure,
};
pub use domain::{Bulletin, BulletinId, BulletinStatus, BulletinSummaryView, SubjectSummaryRow};
pub use lifecycle::{BulletinLifecycle, LifecycleError};
pub use repository::{
    BulletinDispatcher, BulletinRepository, DispatchError, GradebookSource, NoopDispatcher,
    RepositoryError, SourceError,
};
