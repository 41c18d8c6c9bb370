use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::grading::{
    ClassId, GradedStudent, Mention, Period, PeriodId, Student, StudentAverage, StudentId,
    SubjectAverage, SubjectId, Term,
};

/// Identifier of a persisted bulletin.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BulletinId(pub String);

impl fmt::Display for BulletinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a bulletin. `Archived` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulletinStatus {
    Draft,
    Published,
    Archived,
}

impl BulletinStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for BulletinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of one subject's result as printed on the bulletin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectSummaryRow {
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub subject_code: String,
    pub coefficient: f64,
    pub average: f64,
    pub assessment_count: usize,
}

impl From<&SubjectAverage> for SubjectSummaryRow {
    fn from(value: &SubjectAverage) -> Self {
        Self {
            subject_id: value.subject_id.clone(),
            subject_name: value.subject_name.clone(),
            subject_code: value.subject_code.clone(),
            coefficient: value.coefficient,
            average: value.average,
            assessment_count: value.assessment_count,
        }
    }
}

/// Persisted per-student, per-period report. A snapshot: later grade edits only show up
/// after an explicit recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bulletin {
    pub id: BulletinId,
    pub student_id: StudentId,
    pub class_id: ClassId,
    pub period_id: PeriodId,
    pub term: Term,
    pub school_year: String,
    pub general_average: f64,
    pub mention: Mention,
    pub class_rank: Option<u32>,
    pub total_students: Option<u32>,
    pub status: BulletinStatus,
    #[serde(default)]
    pub general_remarks: String,
    pub subjects: Vec<SubjectSummaryRow>,
    pub total_assessments: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Bumped by the repository on every successful write.
    pub version: u64,
}

impl Bulletin {
    pub(crate) fn draft(
        id: BulletinId,
        student: &Student,
        period: &Period,
        average: &StudentAverage,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            student_id: student.id.clone(),
            class_id: student.class_id.clone(),
            period_id: period.id.clone(),
            term: period.term,
            school_year: period.school_year.clone(),
            general_average: average.general_average,
            mention: average.mention,
            class_rank: None,
            total_students: None,
            status: BulletinStatus::Draft,
            general_remarks: String::new(),
            subjects: average.subjects.iter().map(SubjectSummaryRow::from).collect(),
            total_assessments: average.total_assessments,
            created_at: now,
            updated_at: now,
            published_at: None,
            version: 1,
        }
    }

    /// Replaces every computed field at once.
    pub(crate) fn apply_average(&mut self, average: &StudentAverage, now: DateTime<Utc>) {
        self.general_average = average.general_average;
        self.mention = average.mention;
        self.subjects = average.subjects.iter().map(SubjectSummaryRow::from).collect();
        self.total_assessments = average.total_assessments;
        self.updated_at = now;
    }

    pub fn is_archived(&self) -> bool {
        self.status == BulletinStatus::Archived
    }

    pub fn summary_view(&self) -> BulletinSummaryView {
        BulletinSummaryView {
            bulletin_id: self.id.clone(),
            student_id: self.student_id.clone(),
            status: self.status.label(),
            general_average: self.general_average,
            mention: self.mention.label(),
            class_rank: self.class_rank,
            total_students: self.total_students,
        }
    }
}

impl GradedStudent for Bulletin {
    fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    fn general_average(&self) -> f64 {
        self.general_average
    }
}

/// Compact listing row for CLI output and list screens.
#[derive(Debug, Clone, Serialize)]
pub struct BulletinSummaryView {
    pub bulletin_id: BulletinId,
    pub student_id: StudentId,
    pub status: &'static str,
    pub general_average: f64,
    pub mention: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_students: Option<u32>,
}
