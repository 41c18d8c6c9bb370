use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::grading::{
    compute_cohort_statistics, compute_student_averages, rank_cohort, validate_term_grades,
    AccessDenied, AccessVerdict, ClassId, CohortKey, CohortRanking, CohortStatistics,
    GradeIssue, Period, PeriodId, Student, StudentAverage, StudentId, Term,
};

use super::domain::{Bulletin, BulletinId, BulletinStatus};
use super::repository::{BulletinRepository, GradebookSource, RepositoryError, SourceError};

/// Owns the draft -> published -> archived state machine of individual bulletins.
pub struct BulletinLifecycle<S, R> {
    source: Arc<S>,
    repository: Arc<R>,
}

static BULLETIN_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_bulletin_id() -> BulletinId {
    let id = BULLETIN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    BulletinId(format!("bul-{id:06}"))
}

impl<S, R> BulletinLifecycle<S, R>
where
    S: GradebookSource + 'static,
    R: BulletinRepository + 'static,
{
    pub fn new(source: Arc<S>, repository: Arc<R>) -> Self {
        Self { source, repository }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Stores a new draft bulletin for `student` in `period`.
    ///
    /// Rejected when a non-archived bulletin already exists for the pair.
    pub fn create(
        &self,
        student: &Student,
        period: &Period,
        average: &StudentAverage,
    ) -> Result<Bulletin, LifecycleError> {
        if average.student_id != student.id || average.term != period.term {
            return Err(LifecycleError::AverageMismatch {
                student_id: student.id.clone(),
                term: period.term,
            });
        }

        if let Some(existing) = self
            .repository
            .for_student(&student.id, &period.id)?
            .into_iter()
            .find(|bulletin| !bulletin.is_archived())
        {
            return Err(LifecycleError::Duplicate {
                student_id: student.id.clone(),
                period_id: period.id.clone(),
                existing: existing.id,
            });
        }

        let bulletin = Bulletin::draft(next_bulletin_id(), student, period, average, Utc::now());
        let stored = self.repository.insert(bulletin)?;

        info!(
            bulletin = %stored.id,
            student = %stored.student_id,
            period = %stored.period_id,
            general_average = stored.general_average,
            "bulletin drafted"
        );
        Ok(stored)
    }

    /// Recomputes the averages of an existing bulletin from current grades.
    ///
    /// All reads and grade checks happen before the single write, so a failure leaves the
    /// stored bulletin as it was. Status, rank and remarks are untouched.
    pub fn recalculate(&self, id: &BulletinId) -> Result<Bulletin, LifecycleError> {
        let mut bulletin = self.get(id)?;
        if bulletin.is_archived() {
            return Err(LifecycleError::Archived(id.clone()));
        }

        let period = self
            .source
            .period(&bulletin.period_id)?
            .ok_or_else(|| LifecycleError::PeriodMissing(bulletin.period_id.clone()))?;
        let student = self
            .source
            .student(&bulletin.student_id)?
            .ok_or_else(|| LifecycleError::StudentMissing(bulletin.student_id.clone()))?;

        let assessments = self.source.assessments_for_student(&student.id)?;
        let subjects = self.source.subjects()?;
        validate_term_grades(&student.id, &assessments, &subjects, period.term)?;

        let average = compute_student_averages(&student.id, &assessments, &subjects, period.term);
        bulletin.apply_average(&average, Utc::now());
        let stored = self.repository.update(bulletin)?;

        debug!(
            bulletin = %stored.id,
            general_average = stored.general_average,
            "bulletin recalculated"
        );
        Ok(stored)
    }

    /// Moves a draft to `Published`. Any other starting status is rejected.
    pub fn publish(&self, id: &BulletinId) -> Result<Bulletin, LifecycleError> {
        let mut bulletin = self.get(id)?;
        if bulletin.status != BulletinStatus::Draft {
            return Err(LifecycleError::InvalidTransition {
                id: id.clone(),
                from: bulletin.status,
                to: BulletinStatus::Published,
            });
        }

        let now = Utc::now();
        bulletin.status = BulletinStatus::Published;
        bulletin.published_at = Some(now);
        bulletin.updated_at = now;
        let stored = self.repository.update(bulletin)?;

        info!(bulletin = %stored.id, student = %stored.student_id, "bulletin published");
        Ok(stored)
    }

    pub fn archive(&self, id: &BulletinId) -> Result<Bulletin, LifecycleError> {
        let mut bulletin = self.get(id)?;
        if bulletin.is_archived() {
            return Err(LifecycleError::InvalidTransition {
                id: id.clone(),
                from: bulletin.status,
                to: BulletinStatus::Archived,
            });
        }

        bulletin.status = BulletinStatus::Archived;
        bulletin.updated_at = Utc::now();
        let stored = self.repository.update(bulletin)?;

        info!(bulletin = %stored.id, "bulletin archived");
        Ok(stored)
    }

    /// Ranks every live bulletin of the cohort and writes rank and cohort size onto drafts.
    ///
    /// Published bulletins take part in the ranking but keep the values they were published
    /// with. A draft whose write fails is skipped; the pass carries on with the rest and then
    /// reports every skipped draft in `RankingIncomplete`.
    pub fn assign_ranks(
        &self,
        class_id: &ClassId,
        period_id: &PeriodId,
    ) -> Result<CohortRanking, LifecycleError> {
        let cohort = self.live_cohort(class_id, period_id)?;
        let ranking = rank_cohort(&cohort);
        let total_students = ranking.cohort_size() as u32;
        let mut unwritten = Vec::new();

        for mut bulletin in cohort
            .into_iter()
            .filter(|bulletin| bulletin.status == BulletinStatus::Draft)
        {
            let rank = ranking.rank_of(&bulletin.student_id);
            if bulletin.class_rank == rank && bulletin.total_students == Some(total_students) {
                continue;
            }
            bulletin.class_rank = rank;
            bulletin.total_students = Some(total_students);
            bulletin.updated_at = Utc::now();
            let id = bulletin.id.clone();
            if let Err(err) = self.repository.update(bulletin) {
                warn!(bulletin = %id, error = %err, "rank not written");
                unwritten.push(id);
            }
        }

        if !unwritten.is_empty() {
            return Err(LifecycleError::RankingIncomplete {
                class_id: class_id.clone(),
                period_id: period_id.clone(),
                unwritten,
            });
        }

        info!(
            class = %class_id,
            period = %period_id,
            students = total_students,
            "cohort ranked"
        );
        Ok(ranking)
    }

    pub fn cohort_statistics(
        &self,
        class_id: &ClassId,
        period_id: &PeriodId,
    ) -> Result<CohortStatistics, LifecycleError> {
        let cohort = self.live_cohort(class_id, period_id)?;
        let key = CohortKey {
            class_id: class_id.clone(),
            period_id: period_id.clone(),
        };
        Ok(compute_cohort_statistics(key, &cohort))
    }

    /// Fresh averages for one student, gated by the caller's access verdict.
    pub fn student_report(
        &self,
        verdict: &AccessVerdict,
        student_id: &StudentId,
        period_id: &PeriodId,
    ) -> Result<StudentAverage, LifecycleError> {
        verdict.ensure()?;

        let period = self
            .source
            .period(period_id)?
            .ok_or_else(|| LifecycleError::PeriodMissing(period_id.clone()))?;
        if self.source.student(student_id)?.is_none() {
            return Err(LifecycleError::StudentMissing(student_id.clone()));
        }

        Ok(self.fresh_average(student_id, period.term)?)
    }

    pub fn get(&self, id: &BulletinId) -> Result<Bulletin, LifecycleError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| LifecycleError::NotFound(id.clone()))
    }

    fn live_cohort(
        &self,
        class_id: &ClassId,
        period_id: &PeriodId,
    ) -> Result<Vec<Bulletin>, LifecycleError> {
        Ok(self
            .repository
            .for_cohort(class_id, period_id)?
            .into_iter()
            .filter(|bulletin| !bulletin.is_archived())
            .collect())
    }

    fn fresh_average(
        &self,
        student_id: &StudentId,
        term: Term,
    ) -> Result<StudentAverage, SourceError> {
        let assessments = self.source.assessments_for_student(student_id)?;
        let subjects = self.source.subjects()?;
        Ok(compute_student_averages(
            student_id,
            &assessments,
            &subjects,
            term,
        ))
    }
}

/// Error raised by single-bulletin lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("student {student_id} already has bulletin {existing} for period {period_id}")]
    Duplicate {
        student_id: StudentId,
        period_id: PeriodId,
        existing: BulletinId,
    },
    #[error("averages do not belong to student {student_id} in {term}")]
    AverageMismatch { student_id: StudentId, term: Term },
    #[error("bulletin {0} not found")]
    NotFound(BulletinId),
    #[error("student {0} no longer exists")]
    StudentMissing(StudentId),
    #[error("period {0} no longer exists")]
    PeriodMissing(PeriodId),
    #[error("bulletin {0} is archived")]
    Archived(BulletinId),
    #[error("grades rejected: {0}")]
    InvalidGrades(#[from] GradeIssue),
    #[error("ranking of class {class_id} in {period_id} left {} drafts unranked", .unwritten.len())]
    RankingIncomplete {
        class_id: ClassId,
        period_id: PeriodId,
        unwritten: Vec<BulletinId>,
    },
    #[error("bulletin {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: BulletinId,
        from: BulletinStatus,
        to: BulletinStatus,
    },
    #[error(transparent)]
    Access(#[from] AccessDenied),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
