//! Pure grade computations: averages, mentions, ranking and cohort statistics.
//!
//! Nothing in here performs I/O. The averaging functions accept any input and produce zeroed
//! results when it is empty; `validate_term_grades` is the gate that rejects grades before
//! they are written anywhere.

pub mod access;
pub mod averaging;
pub mod domain;
pub mod import;
pub mod mention;
pub mod ranking;
pub mod statistics;
pub mod validation;

pub use access::{AccessDenied, AccessVerdict, ViewerContext};
pub use averaging::{
    compute_general_average, compute_student_averages, compute_subject_average, round2,
    StudentAverage, SubjectAverage,
};
pub use domain::{
    Assessment, AssessmentId, ClassId, CohortKey, EvaluationKind, GradedStudent, Period,
    PeriodId, Student, StudentId, Subject, SubjectId, Term,
};
pub use import::{AssessmentImporter, ImportError};
pub use mention::{classify, Mention};
pub use ranking::{rank_cohort, CohortRanking, RankedStudent};
pub use statistics::{compute_cohort_statistics, CohortStatistics, PASS_MARK};
pub use validation::{validate_term_grades, GradeIssue};
