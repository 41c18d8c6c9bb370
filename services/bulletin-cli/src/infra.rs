use bulletin_engine::bulletins::{
    Bulletin, BulletinDispatcher, BulletinId, BulletinRepository, DispatchError,
    GradebookSource, RepositoryError, SourceError,
};
use bulletin_engine::error::AppError;
use bulletin_engine::grading::{
    Assessment, AssessmentImporter, ClassId, Period, PeriodId, Student, StudentId, Subject,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Gradebook export loaded from a JSON file, optionally with grades from a CSV export.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct GradebookSnapshot {
    #[serde(default)]
    pub(crate) periods: Vec<Period>,
    #[serde(default)]
    pub(crate) students: Vec<Student>,
    #[serde(default)]
    pub(crate) subjects: Vec<Subject>,
    #[serde(default)]
    pub(crate) assessments: Vec<Assessment>,
}

impl GradebookSnapshot {
    /// Reads the JSON snapshot; grades from `assessments_csv` replace any embedded ones.
    pub(crate) fn load(path: &Path, assessments_csv: Option<&Path>) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        let mut snapshot: GradebookSnapshot = serde_json::from_str(&raw)?;

        if let Some(csv_path) = assessments_csv {
            snapshot.assessments = AssessmentImporter::from_path(csv_path)?;
        }

        info!(
            path = %path.display(),
            students = snapshot.students.len(),
            subjects = snapshot.subjects.len(),
            assessments = snapshot.assessments.len(),
            "gradebook snapshot loaded"
        );
        Ok(snapshot)
    }
}

impl GradebookSource for GradebookSnapshot {
    fn period(&self, id: &PeriodId) -> Result<Option<Period>, SourceError> {
        Ok(self.periods.iter().find(|period| &period.id == id).cloned())
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, SourceError> {
        Ok(self.students.iter().find(|student| &student.id == id).cloned())
    }

    fn class_roster(&self, class_id: &ClassId) -> Result<Vec<Student>, SourceError> {
        Ok(self
            .students
            .iter()
            .filter(|student| &student.class_id == class_id)
            .cloned()
            .collect())
    }

    fn assessments_for_student(&self, id: &StudentId) -> Result<Vec<Assessment>, SourceError> {
        Ok(self
            .assessments
            .iter()
            .filter(|assessment| &assessment.student_id == id)
            .cloned()
            .collect())
    }

    fn subjects(&self) -> Result<Vec<Subject>, SourceError> {
        Ok(self.subjects.clone())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryBulletinRepository {
    records: Arc<Mutex<HashMap<BulletinId, Bulletin>>>,
}

impl InMemoryBulletinRepository {
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<BulletinId, Bulletin>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("bulletin store poisoned".to_string()))
    }

    fn select<F>(&self, keep: F) -> Result<Vec<Bulletin>, RepositoryError>
    where
        F: Fn(&Bulletin) -> bool,
    {
        let guard = self.lock()?;
        let mut bulletins: Vec<Bulletin> = guard.values().filter(|b| keep(b)).cloned().collect();
        bulletins.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(bulletins)
    }
}

impl BulletinRepository for InMemoryBulletinRepository {
    fn insert(&self, bulletin: Bulletin) -> Result<Bulletin, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&bulletin.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(bulletin.id.clone(), bulletin.clone());
        Ok(bulletin)
    }

    fn update(&self, mut bulletin: Bulletin) -> Result<Bulletin, RepositoryError> {
        let mut guard = self.lock()?;
        let found = guard
            .get(&bulletin.id)
            .map(|stored| stored.version)
            .ok_or(RepositoryError::NotFound)?;
        if found != bulletin.version {
            return Err(RepositoryError::StaleVersion {
                expected: bulletin.version,
                found,
            });
        }
        bulletin.version += 1;
        guard.insert(bulletin.id.clone(), bulletin.clone());
        Ok(bulletin)
    }

    fn fetch(&self, id: &BulletinId) -> Result<Option<Bulletin>, RepositoryError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn for_student(
        &self,
        student_id: &StudentId,
        period_id: &PeriodId,
    ) -> Result<Vec<Bulletin>, RepositoryError> {
        self.select(|b| &b.student_id == student_id && &b.period_id == period_id)
    }

    fn for_cohort(
        &self,
        class_id: &ClassId,
        period_id: &PeriodId,
    ) -> Result<Vec<Bulletin>, RepositoryError> {
        self.select(|b| &b.class_id == class_id && &b.period_id == period_id)
    }
}

/// Stands in for the PDF renderer and mail relay: records each request in the log.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LogDispatcher;

impl BulletinDispatcher for LogDispatcher {
    fn render_pdf(&self, bulletin: &Bulletin) -> Result<(), DispatchError> {
        info!(bulletin = %bulletin.id, student = %bulletin.student_id, "pdf rendering queued");
        Ok(())
    }

    fn send_email(&self, bulletin: &Bulletin) -> Result<(), DispatchError> {
        info!(bulletin = %bulletin.id, student = %bulletin.student_id, "bulletin e-mail queued");
        Ok(())
    }
}
