use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::grading::{
    compute_student_averages, validate_term_grades, ClassId, GradeIssue, Period, PeriodId,
    StudentId,
};

use super::domain::{Bulletin, BulletinId};
use super::lifecycle::{BulletinLifecycle, LifecycleError};
use super::repository::{BulletinDispatcher, BulletinRepository, GradebookSource, SourceError};

/// Which students a generation run covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationScope {
    Students(Vec<StudentId>),
    Class(ClassId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub produce_pdf: bool,
    pub send_email: bool,
    pub assign_ranks: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            produce_pdf: false,
            send_email: false,
            assign_ranks: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub scope: GenerationScope,
    pub period_id: PeriodId,
    #[serde(default)]
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub student_id: StudentId,
    pub reason: String,
}

/// Aggregate outcome of a generation run. Always returned, even when every student failed.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub period_id: PeriodId,
    pub generated: usize,
    pub failed: usize,
    pub errors: Vec<BatchFailure>,
    pub bulletins: Vec<Bulletin>,
    pub warnings: Vec<String>,
}

impl BatchReport {
    fn new(period_id: PeriodId) -> Self {
        Self {
            period_id,
            generated: 0,
            failed: 0,
            errors: Vec::new(),
            bulletins: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn record(&mut self, student_id: StudentId, outcome: Result<Bulletin, StudentFailure>) {
        match outcome {
            Ok(bulletin) => {
                self.generated += 1;
                self.bulletins.push(bulletin);
            }
            Err(failure) => {
                warn!(student = %student_id, reason = %failure, "bulletin generation failed");
                self.failed += 1;
                self.errors.push(BatchFailure {
                    student_id,
                    reason: failure.to_string(),
                });
            }
        }
    }

    fn finish(mut self) -> Self {
        self.errors.sort_by(|a, b| a.student_id.cmp(&b.student_id));
        self.bulletins
            .sort_by(|a, b| a.student_id.cmp(&b.student_id));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub bulletin_id: BulletinId,
    pub reason: String,
}

/// Per-item outcome of a list of independent single-bulletin operations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkOperationReport {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<BulkFailure>,
    pub bulletins: Vec<Bulletin>,
}

impl BulkOperationReport {
    fn record(&mut self, id: &BulletinId, outcome: Result<Bulletin, LifecycleError>) {
        match outcome {
            Ok(bulletin) => {
                self.succeeded += 1;
                self.bulletins.push(bulletin);
            }
            Err(err) => self.fail(id, err.to_string()),
        }
    }

    fn fail(&mut self, id: &BulletinId, reason: String) {
        warn!(bulletin = %id, reason = %reason, "bulk bulletin operation failed");
        self.failed += 1;
        self.errors.push(BulkFailure {
            bulletin_id: id.clone(),
            reason,
        });
    }
}

/// Stops one run before its next student. Create a fresh flag for every run you may want to
/// cancel; a cancelled flag stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Drives per-student bulletin creation across a class or an explicit list of students.
pub struct BatchGenerationOrchestrator<S, R, D> {
    lifecycle: Arc<BulletinLifecycle<S, R>>,
    dispatcher: Arc<D>,
    config: EngineConfig,
}

impl<S, R, D> BatchGenerationOrchestrator<S, R, D>
where
    S: GradebookSource + 'static,
    R: BulletinRepository + 'static,
    D: BulletinDispatcher + 'static,
{
    pub fn new(
        lifecycle: Arc<BulletinLifecycle<S, R>>,
        dispatcher: Arc<D>,
        config: EngineConfig,
    ) -> Self {
        Self {
            lifecycle,
            dispatcher,
            config,
        }
    }

    /// Generates draft bulletins for every student the request resolves to.
    ///
    /// Only configuration problems (unknown or inactive period, nobody to generate for) are
    /// returned as errors; per-student failures end up in the report.
    pub fn generate(&self, request: GenerationRequest) -> Result<BatchReport, BatchError> {
        self.generate_with(request, &CancellationFlag::default())
    }

    /// Same as [`generate`](Self::generate), stopping before the next student once
    /// `cancellation` is set. Students not yet started are reported as cancelled.
    pub fn generate_with(
        &self,
        request: GenerationRequest,
        cancellation: &CancellationFlag,
    ) -> Result<BatchReport, BatchError> {
        let GenerationRequest {
            scope,
            period_id,
            options,
        } = request;

        let period = self.active_period(&period_id)?;
        let student_ids = self.resolve_students(scope)?;

        info!(
            period = %period.id,
            students = student_ids.len(),
            workers = self.config.workers,
            "starting bulletin generation"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|err| BatchError::WorkerPool(err.to_string()))?;

        let outcomes: Vec<(StudentId, Result<Bulletin, StudentFailure>)> = pool.install(|| {
            student_ids
                .par_iter()
                .map(|student_id| {
                    let outcome = self.generate_for_student(student_id, &period, cancellation);
                    (student_id.clone(), outcome)
                })
                .collect()
        });

        let mut report = BatchReport::new(period.id.clone());
        for (student_id, outcome) in outcomes {
            report.record(student_id, outcome);
        }

        if options.assign_ranks && !report.bulletins.is_empty() {
            self.rank_generated(&period, &mut report);
        }
        if options.produce_pdf || options.send_email {
            self.dispatch(&options, &mut report);
        }

        let report = report.finish();
        info!(
            period = %report.period_id,
            generated = report.generated,
            failed = report.failed,
            warnings = report.warnings.len(),
            "bulletin generation finished"
        );
        Ok(report)
    }

    /// Publishes each bulletin independently and reports true per-item counts.
    pub fn publish_many(&self, ids: &[BulletinId]) -> BulkOperationReport {
        let mut report = BulkOperationReport::default();
        for id in ids {
            report.record(id, self.lifecycle.publish(id));
        }
        report
    }

    /// Recalculates every live bulletin of a cohort from current grades, then re-ranks it.
    pub fn regenerate_cohort(
        &self,
        class_id: &ClassId,
        period_id: &PeriodId,
    ) -> Result<BulkOperationReport, BatchError> {
        self.regenerate_cohort_with(class_id, period_id, &CancellationFlag::default())
    }

    pub fn regenerate_cohort_with(
        &self,
        class_id: &ClassId,
        period_id: &PeriodId,
        cancellation: &CancellationFlag,
    ) -> Result<BulkOperationReport, BatchError> {
        self.active_period(period_id)?;

        let ids: Vec<BulletinId> = self
            .lifecycle
            .repository()
            .for_cohort(class_id, period_id)
            .map_err(|err| BatchError::Storage(err.to_string()))?
            .into_iter()
            .filter(|bulletin| !bulletin.is_archived())
            .map(|bulletin| bulletin.id)
            .collect();

        let mut report = BulkOperationReport::default();
        for id in &ids {
            if cancellation.is_cancelled() {
                report.fail(id, StudentFailure::Cancelled.to_string());
                continue;
            }
            report.record(id, self.lifecycle.recalculate(id));
        }

        if report.succeeded > 0 {
            if let Err(err) = self.lifecycle.assign_ranks(class_id, period_id) {
                warn!(class = %class_id, error = %err, "re-ranking after regeneration failed");
            }
            for bulletin in report.bulletins.iter_mut() {
                if let Ok(fresh) = self.lifecycle.get(&bulletin.id) {
                    *bulletin = fresh;
                }
            }
        }

        Ok(report)
    }

    fn active_period(&self, period_id: &PeriodId) -> Result<Period, BatchError> {
        let period = self
            .lifecycle
            .source()
            .period(period_id)?
            .ok_or_else(|| BatchError::PeriodNotFound(period_id.clone()))?;
        if !period.active {
            return Err(BatchError::PeriodInactive(period_id.clone()));
        }
        Ok(period)
    }

    fn resolve_students(&self, scope: GenerationScope) -> Result<Vec<StudentId>, BatchError> {
        let ids: Vec<StudentId> = match scope {
            GenerationScope::Students(ids) => {
                if ids.is_empty() {
                    return Err(BatchError::NoStudents);
                }
                ids
            }
            GenerationScope::Class(class_id) => {
                let roster = self.lifecycle.source().class_roster(&class_id)?;
                if roster.is_empty() {
                    return Err(BatchError::EmptyClass(class_id));
                }
                roster.into_iter().map(|student| student.id).collect()
            }
        };

        let mut seen = HashSet::new();
        Ok(ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect())
    }

    fn generate_for_student(
        &self,
        student_id: &StudentId,
        period: &Period,
        cancellation: &CancellationFlag,
    ) -> Result<Bulletin, StudentFailure> {
        if cancellation.is_cancelled() {
            return Err(StudentFailure::Cancelled);
        }

        let source = self.lifecycle.source();
        let student = source
            .student(student_id)?
            .ok_or_else(|| StudentFailure::NotFound(student_id.clone()))?;
        let assessments = source.assessments_for_student(&student.id)?;
        let subjects = source.subjects()?;

        validate_term_grades(&student.id, &assessments, &subjects, period.term)?;

        let average = compute_student_averages(&student.id, &assessments, &subjects, period.term);
        Ok(self.lifecycle.create(&student, period, &average)?)
    }

    fn rank_generated(&self, period: &Period, report: &mut BatchReport) {
        let classes: BTreeSet<ClassId> = report
            .bulletins
            .iter()
            .map(|bulletin| bulletin.class_id.clone())
            .collect();

        for class_id in classes {
            if let Err(err) = self.lifecycle.assign_ranks(&class_id, &period.id) {
                warn!(class = %class_id, error = %err, "ranking pass failed");
                report
                    .warnings
                    .push(format!("ranking for class {class_id} failed: {err}"));
            }
        }

        for bulletin in report.bulletins.iter_mut() {
            match self.lifecycle.get(&bulletin.id) {
                Ok(fresh) => *bulletin = fresh,
                Err(err) => report
                    .warnings
                    .push(format!("could not reload bulletin {}: {err}", bulletin.id)),
            }
        }
    }

    fn dispatch(&self, options: &GenerationOptions, report: &mut BatchReport) {
        for bulletin in &report.bulletins {
            if options.produce_pdf {
                if let Err(err) = self.dispatcher.render_pdf(bulletin) {
                    warn!(bulletin = %bulletin.id, error = %err, "pdf rendering failed");
                    report
                        .warnings
                        .push(format!("bulletin {}: {err}", bulletin.id));
                }
            }
            if options.send_email {
                if let Err(err) = self.dispatcher.send_email(bulletin) {
                    warn!(bulletin = %bulletin.id, error = %err, "bulletin e-mail failed");
                    report
                        .warnings
                        .push(format!("bulletin {}: {err}", bulletin.id));
                }
            }
        }
    }
}

/// Configuration problems that stop a batch before any student is processed.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("period {0} not found")]
    PeriodNotFound(PeriodId),
    #[error("period {0} is not active")]
    PeriodInactive(PeriodId),
    #[error("no students to generate bulletins for")]
    NoStudents,
    #[error("class {0} has no enrolled students")]
    EmptyClass(ClassId),
    #[error("could not start worker pool: {0}")]
    WorkerPool(String),
    #[error("bulletin storage unavailable: {0}")]
    Storage(String),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Reason a single student's bulletin was not produced.
#[derive(Debug, thiserror::Error)]
pub enum StudentFailure {
    #[error("student {0} not found")]
    NotFound(StudentId),
    #[error(transparent)]
    InvalidGrades(#[from] GradeIssue),
    #[error("generation cancelled")]
    Cancelled,
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Source(#[from] SourceError),
}
