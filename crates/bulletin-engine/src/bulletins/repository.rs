use crate::grading::{Assessment, ClassId, Period, PeriodId, Student, StudentId, Subject};

use super::domain::{Bulletin, BulletinId};

/// Read access to the grading subsystem. Every call must return current data; the engine
/// keeps no cache between calls.
pub trait GradebookSource: Send + Sync {
    fn period(&self, id: &PeriodId) -> Result<Option<Period>, SourceError>;
    fn student(&self, id: &StudentId) -> Result<Option<Student>, SourceError>;
    fn class_roster(&self, class_id: &ClassId) -> Result<Vec<Student>, SourceError>;
    fn assessments_for_student(&self, id: &StudentId) -> Result<Vec<Assessment>, SourceError>;
    fn subjects(&self) -> Result<Vec<Subject>, SourceError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("gradebook unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for bulletins.
///
/// `update` is an optimistic write: the stored version must equal `bulletin.version`,
/// otherwise `StaleVersion` is returned and nothing changes. Successful inserts and updates
/// return the record as stored.
pub trait BulletinRepository: Send + Sync {
    fn insert(&self, bulletin: Bulletin) -> Result<Bulletin, RepositoryError>;
    fn update(&self, bulletin: Bulletin) -> Result<Bulletin, RepositoryError>;
    fn fetch(&self, id: &BulletinId) -> Result<Option<Bulletin>, RepositoryError>;
    fn for_student(
        &self,
        student_id: &StudentId,
        period_id: &PeriodId,
    ) -> Result<Vec<Bulletin>, RepositoryError>;
    fn for_cohort(
        &self,
        class_id: &ClassId,
        period_id: &PeriodId,
    ) -> Result<Vec<Bulletin>, RepositoryError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale write: expected version {expected}, stored version is {found}")]
    StaleVersion { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hooks for PDF rendering and e-mail delivery of finished bulletins.
pub trait BulletinDispatcher: Send + Sync {
    fn render_pdf(&self, bulletin: &Bulletin) -> Result<(), DispatchError>;
    fn send_email(&self, bulletin: &Bulletin) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error("pdf renderer failed: {0}")]
    Render(String),
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Dispatcher used when neither PDF nor e-mail output is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

impl BulletinDispatcher for NoopDispatcher {
    fn render_pdf(&self, _bulletin: &Bulletin) -> Result<(), DispatchError> {
        Ok(())
    }

    fn send_email(&self, _bulletin: &Bulletin) -> Result<(), DispatchError> {
        Ok(())
    }
}
