use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::bulletins::domain::{Bulletin, BulletinId};
use crate::bulletins::repository::{
    BulletinDispatcher, BulletinRepository, DispatchError, GradebookSource, RepositoryError,
    SourceError,
};
use crate::bulletins::{BatchGenerationOrchestrator, BulletinLifecycle};
use crate::config::EngineConfig;
use crate::grading::{
    compute_student_averages, Assessment, AssessmentId, ClassId, EvaluationKind, Period,
    PeriodId, Student, StudentAverage, StudentId, Subject, SubjectId, Term,
};

pub(super) const CLASS: &str = "c-6a";
pub(super) const PERIOD: &str = "p-2025-t1";
pub(super) const CLOSED_PERIOD: &str = "p-2024-t3";

pub(super) fn class_id() -> ClassId {
    ClassId::new(CLASS)
}

pub(super) fn period_id() -> PeriodId {
    PeriodId::new(PERIOD)
}

pub(super) fn student_id(raw: &str) -> StudentId {
    StudentId::new(raw)
}

pub(super) fn period() -> Period {
    Period {
        id: period_id(),
        term: Term::First,
        school_year: "2025-2026".to_string(),
        active: true,
    }
}

fn closed_period() -> Period {
    Period {
        id: PeriodId::new(CLOSED_PERIOD),
        term: Term::Third,
        school_year: "2024-2025".to_string(),
        active: false,
    }
}

fn student(id: &str, class: &str, first: &str, last: &str) -> Student {
    Student {
        id: StudentId::new(id),
        class_id: ClassId::new(class),
        first_name: first.to_string(),
        last_name: last.to_string(),
    }
}

fn subject(id: &str, code: &str, name: &str, coefficient: f64) -> Subject {
    Subject {
        id: SubjectId::new(id),
        name: name.to_string(),
        code: code.to_string(),
        coefficient,
        active: true,
    }
}

pub(super) fn assessment(
    id: &str,
    student: &str,
    subject: &str,
    term: Term,
    value: f64,
    coefficient: Option<f64>,
) -> Assessment {
    Assessment {
        id: AssessmentId::new(id),
        student_id: StudentId::new(student),
        subject_id: SubjectId::new(subject),
        term,
        value,
        coefficient,
        kind: EvaluationKind::Test,
        recorded_on: NaiveDate::from_ymd_opt(2025, 10, 14).expect("valid date"),
        updated_at: None,
    }
}

/// Class c-6a in term 1:
///
/// | student | math (x4) | french (x3) | general |
/// |---------|-----------|-------------|---------|
/// | s-01    | 16, 18    | 14          | 15.71   |
/// | s-02    | 12        | 12          | 12.00   |
/// | s-03    | 8         | 10          | 8.86    |
/// | s-04    | 12        | 12          | 12.00   |
///
/// s-05 sits in c-6b and has no grades.
pub(super) fn seeded_assessments() -> Vec<Assessment> {
    vec![
        assessment("a-01", "s-01", "math", Term::First, 16.0, None),
        assessment("a-02", "s-01", "math", Term::First, 18.0, None),
        assessment("a-03", "s-01", "french", Term::First, 14.0, Some(2.0)),
        assessment("a-04", "s-01", "math", Term::Second, 2.0, None),
        assessment("a-05", "s-02", "math", Term::First, 12.0, None),
        assessment("a-06", "s-02", "french", Term::First, 12.0, None),
        assessment("a-07", "s-03", "math", Term::First, 8.0, None),
        assessment("a-08", "s-03", "french", Term::First, 10.0, None),
        assessment("a-09", "s-04", "math", Term::First, 12.0, None),
        assessment("a-10", "s-04", "french", Term::First, 12.0, None),
    ]
}

#[derive(Default)]
struct GradebookState {
    periods: Vec<Period>,
    students: Vec<Student>,
    subjects: Vec<Subject>,
    assessments: Vec<Assessment>,
    offline: bool,
}

/// Mutable in-memory gradebook; tests edit grades between engine calls.
#[derive(Default, Clone)]
pub(super) struct MemoryGradebook {
    state: Arc<Mutex<GradebookState>>,
}

impl MemoryGradebook {
    pub(super) fn seeded() -> Self {
        let gradebook = Self::default();
        {
            let mut state = gradebook.state.lock().expect("gradebook mutex poisoned");
            state.periods = vec![period(), closed_period()];
            state.students = vec![
                student("s-01", CLASS, "Ama", "Mensah"),
                student("s-02", CLASS, "Kofi", "Boateng"),
                student("s-03", CLASS, "Esi", "Owusu"),
                student("s-04", CLASS, "Yaw", "Asante"),
                student("s-05", "c-6b", "Akua", "Danso"),
            ];
            state.subjects = vec![
                subject("math", "MATH", "Mathematics", 4.0),
                subject("french", "FR", "French", 3.0),
                subject("history", "HIST", "History", 2.0),
            ];
            state.assessments = seeded_assessments();
        }
        gradebook
    }

    pub(super) fn add_assessment(&self, assessment: Assessment) {
        self.state
            .lock()
            .expect("gradebook mutex poisoned")
            .assessments
            .push(assessment);
    }

    pub(super) fn set_value(&self, assessment_id: &str, value: f64) {
        let mut state = self.state.lock().expect("gradebook mutex poisoned");
        for assessment in state
            .assessments
            .iter_mut()
            .filter(|assessment| assessment.id.as_str() == assessment_id)
        {
            assessment.value = value;
        }
    }

    pub(super) fn move_assessment_to_term(&self, assessment_id: &str, term: Term) {
        let mut state = self.state.lock().expect("gradebook mutex poisoned");
        for assessment in state
            .assessments
            .iter_mut()
            .filter(|assessment| assessment.id.as_str() == assessment_id)
        {
            assessment.term = term;
        }
    }

    pub(super) fn add_subject(&self, id: &str, coefficient: f64) {
        self.state
            .lock()
            .expect("gradebook mutex poisoned")
            .subjects
            .push(subject(id, &id.to_uppercase(), id, coefficient));
    }

    pub(super) fn add_student(&self, id: &str, class: &str) {
        self.state
            .lock()
            .expect("gradebook mutex poisoned")
            .students
            .push(student(id, class, "Test", "Student"));
    }

    pub(super) fn remove_period(&self, id: &PeriodId) {
        self.state
            .lock()
            .expect("gradebook mutex poisoned")
            .periods
            .retain(|period| &period.id != id);
    }

    pub(super) fn set_offline(&self, offline: bool) {
        self.state.lock().expect("gradebook mutex poisoned").offline = offline;
    }

    pub(super) fn average_for(&self, student: &str) -> StudentAverage {
        let state = self.state.lock().expect("gradebook mutex poisoned");
        compute_student_averages(
            &StudentId::new(student),
            &state.assessments,
            &state.subjects,
            Term::First,
        )
    }

    pub(super) fn student_record(&self, id: &str) -> Student {
        let state = self.state.lock().expect("gradebook mutex poisoned");
        state
            .students
            .iter()
            .find(|student| student.id.as_str() == id)
            .cloned()
            .expect("seeded student")
    }

    fn read(&self) -> Result<std::sync::MutexGuard<'_, GradebookState>, SourceError> {
        let state = self.state.lock().expect("gradebook mutex poisoned");
        if state.offline {
            return Err(SourceError::Unavailable("gradebook offline".to_string()));
        }
        Ok(state)
    }
}

impl GradebookSource for MemoryGradebook {
    fn period(&self, id: &PeriodId) -> Result<Option<Period>, SourceError> {
        Ok(self
            .read()?
            .periods
            .iter()
            .find(|period| &period.id == id)
            .cloned())
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, SourceError> {
        Ok(self
            .read()?
            .students
            .iter()
            .find(|student| &student.id == id)
            .cloned())
    }

    fn class_roster(&self, class_id: &ClassId) -> Result<Vec<Student>, SourceError> {
        Ok(self
            .read()?
            .students
            .iter()
            .filter(|student| &student.class_id == class_id)
            .cloned()
            .collect())
    }

    fn assessments_for_student(&self, id: &StudentId) -> Result<Vec<Assessment>, SourceError> {
        Ok(self
            .read()?
            .assessments
            .iter()
            .filter(|assessment| &assessment.student_id == id)
            .cloned()
            .collect())
    }

    fn subjects(&self) -> Result<Vec<Subject>, SourceError> {
        Ok(self.read()?.subjects.clone())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<BulletinId, Bulletin>>>,
    read_only: Arc<Mutex<HashSet<BulletinId>>>,
}

impl MemoryRepository {
    /// Makes every later update of `id` fail as if the store were unreachable.
    pub(super) fn refuse_updates_to(&self, id: &BulletinId) {
        self.read_only
            .lock()
            .expect("repository mutex poisoned")
            .insert(id.clone());
    }

    pub(super) fn all(&self) -> Vec<Bulletin> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut bulletins: Vec<Bulletin> = guard.values().cloned().collect();
        bulletins.sort_by(|a, b| a.student_id.cmp(&b.student_id));
        bulletins
    }

    fn matching<F>(&self, predicate: F) -> Vec<Bulletin>
    where
        F: Fn(&Bulletin) -> bool,
    {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut bulletins: Vec<Bulletin> =
            guard.values().filter(|b| predicate(b)).cloned().collect();
        bulletins.sort_by(|a, b| a.id.cmp(&b.id));
        bulletins
    }
}

impl BulletinRepository for MemoryRepository {
    fn insert(&self, bulletin: Bulletin) -> Result<Bulletin, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&bulletin.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(bulletin.id.clone(), bulletin.clone());
        Ok(bulletin)
    }

    fn update(&self, mut bulletin: Bulletin) -> Result<Bulletin, RepositoryError> {
        if self
            .read_only
            .lock()
            .expect("repository mutex poisoned")
            .contains(&bulletin.id)
        {
            return Err(RepositoryError::Unavailable("write refused".to_string()));
        }
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard.get(&bulletin.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != bulletin.version {
            return Err(RepositoryError::StaleVersion {
                expected: bulletin.version,
                found: stored.version,
            });
        }
        bulletin.version += 1;
        guard.insert(bulletin.id.clone(), bulletin.clone());
        Ok(bulletin)
    }

    fn fetch(&self, id: &BulletinId) -> Result<Option<Bulletin>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn for_student(
        &self,
        student_id: &StudentId,
        period_id: &PeriodId,
    ) -> Result<Vec<Bulletin>, RepositoryError> {
        Ok(self.matching(|b| &b.student_id == student_id && &b.period_id == period_id))
    }

    fn for_cohort(
        &self,
        class_id: &ClassId,
        period_id: &PeriodId,
    ) -> Result<Vec<Bulletin>, RepositoryError> {
        Ok(self.matching(|b| &b.class_id == class_id && &b.period_id == period_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Dispatched {
    Pdf(StudentId),
    Email(StudentId),
}

/// Records every dispatch; e-mail can be switched to fail.
#[derive(Default, Clone)]
pub(super) struct RecordingDispatcher {
    events: Arc<Mutex<Vec<Dispatched>>>,
    pub(super) fail_email: bool,
}

impl RecordingDispatcher {
    pub(super) fn failing_email() -> Self {
        Self {
            fail_email: true,
            ..Self::default()
        }
    }

    pub(super) fn events(&self) -> Vec<Dispatched> {
        let mut events = self.events.lock().expect("dispatch mutex poisoned").clone();
        events.sort_by_key(|event| format!("{event:?}"));
        events
    }
}

impl BulletinDispatcher for RecordingDispatcher {
    fn render_pdf(&self, bulletin: &Bulletin) -> Result<(), DispatchError> {
        self.events
            .lock()
            .expect("dispatch mutex poisoned")
            .push(Dispatched::Pdf(bulletin.student_id.clone()));
        Ok(())
    }

    fn send_email(&self, bulletin: &Bulletin) -> Result<(), DispatchError> {
        if self.fail_email {
            return Err(DispatchError::Transport("smtp relay refused".to_string()));
        }
        self.events
            .lock()
            .expect("dispatch mutex poisoned")
            .push(Dispatched::Email(bulletin.student_id.clone()));
        Ok(())
    }
}

pub(super) type TestLifecycle = BulletinLifecycle<MemoryGradebook, MemoryRepository>;
pub(super) type TestOrchestrator =
    BatchGenerationOrchestrator<MemoryGradebook, MemoryRepository, RecordingDispatcher>;

pub(super) fn lifecycle() -> (TestLifecycle, MemoryGradebook, MemoryRepository) {
    let gradebook = MemoryGradebook::seeded();
    let repository = MemoryRepository::default();
    let lifecycle =
        BulletinLifecycle::new(Arc::new(gradebook.clone()), Arc::new(repository.clone()));
    (lifecycle, gradebook, repository)
}

pub(super) fn orchestrator_with(
    dispatcher: RecordingDispatcher,
    workers: usize,
) -> (TestOrchestrator, MemoryGradebook, MemoryRepository) {
    let (lifecycle, gradebook, repository) = lifecycle();
    let orchestrator = BatchGenerationOrchestrator::new(
        Arc::new(lifecycle),
        Arc::new(dispatcher),
        EngineConfig { workers },
    );
    (orchestrator, gradebook, repository)
}

pub(super) fn orchestrator() -> (TestOrchestrator, MemoryGradebook, MemoryRepository) {
    orchestrator_with(RecordingDispatcher::default(), 2)
}

/// Drafts a bulletin for `student` directly through the lifecycle.
pub(super) fn draft(
    lifecycle: &TestLifecycle,
    gradebook: &MemoryGradebook,
    student: &str,
) -> Bulletin {
    lifecycle
        .create(
            &gradebook.student_record(student),
            &period(),
            &gradebook.average_for(student),
        )
        .expect("draft created")
}
