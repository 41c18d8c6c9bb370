use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of an enrolled student.
    StudentId
);
string_id!(
    /// Identifier of a class (a group of students taught together).
    ClassId
);
string_id!(
    /// Identifier of a subject in the catalog.
    SubjectId
);
string_id!(
    /// Identifier of a grading period (one term of a school year).
    PeriodId
);
string_id!(AssessmentId);

/// One of the three grading terms of a school year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    First,
    Second,
    Third,
}

impl Term {
    pub const fn label(self) -> &'static str {
        match self {
            Self::First => "Term 1",
            Self::Second => "Term 2",
            Self::Third => "Term 3",
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Term {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "t1" | "first" | "trimestre1" | "trimestre_1" => Ok(Self::First),
            "2" | "t2" | "second" | "trimestre2" | "trimestre_2" => Ok(Self::Second),
            "3" | "t3" | "third" | "trimestre3" | "trimestre_3" => Ok(Self::Third),
            other => Err(format!("unknown term '{other}'")),
        }
    }
}

/// Kind of evaluation an assessment records. Informational only; never used in weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationKind {
    Homework,
    Test,
    Exam,
}

impl EvaluationKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Homework => "Homework",
            Self::Test => "Test",
            Self::Exam => "Exam",
        }
    }
}

impl FromStr for EvaluationKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "homework" | "devoir" => Ok(Self::Homework),
            "test" | "interrogation" | "quiz" => Ok(Self::Test),
            "exam" | "examen" | "composition" => Ok(Self::Exam),
            other => Err(format!("unknown evaluation kind '{other}'")),
        }
    }
}

/// A single graded evaluation of a student in a subject, marked out of 20.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub term: Term,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficient: Option<f64>,
    pub kind: EvaluationKind,
    pub recorded_on: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Assessment {
    pub const MAX_VALUE: f64 = 20.0;

    /// Weight applied when averaging; an unset coefficient counts as 1.
    pub fn weight(&self) -> f64 {
        self.coefficient.unwrap_or(1.0)
    }
}

/// Catalog entry for a taught subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub code: String,
    pub coefficient: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Grading period descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: PeriodId,
    pub term: Term,
    pub school_year: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub class_id: ClassId,
    pub first_name: String,
    pub last_name: String,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.last_name.to_uppercase(), self.first_name)
    }
}

/// A class within a period: the unit of ranking and statistics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CohortKey {
    pub class_id: ClassId,
    pub period_id: PeriodId,
}

/// Anything that carries a student's general average for cohort-level computations.
pub trait GradedStudent {
    fn student_id(&self) -> &StudentId;
    fn general_average(&self) -> f64;
}

fn default_active() -> bool {
    true
}
