use std::collections::HashMap;

use super::domain::{Assessment, StudentId, Subject, SubjectId, Term};

/// Grade data that must not reach a stored bulletin.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GradeIssue {
    #[error("no assessments recorded for {term}")]
    NoAssessments { term: Term },
    #[error("assessment {assessment} has value {value} outside 0-20")]
    ValueOutOfRange { assessment: String, value: f64 },
    #[error("assessment {assessment} has invalid coefficient {coefficient}")]
    InvalidCoefficient { assessment: String, coefficient: f64 },
    #[error("assessment {assessment} references unknown subject {subject}")]
    UnknownSubject {
        assessment: String,
        subject: SubjectId,
    },
    #[error("subject {subject} has invalid coefficient {coefficient}")]
    InvalidSubjectCoefficient { subject: SubjectId, coefficient: f64 },
}

/// Checks one student's grades for `term` before they are averaged into a bulletin.
///
/// Only assessments of that student and term are inspected, and only the catalog subjects
/// they reference.
pub fn validate_term_grades(
    student_id: &StudentId,
    assessments: &[Assessment],
    subjects: &[Subject],
    term: Term,
) -> Result<(), GradeIssue> {
    let catalog: HashMap<&SubjectId, &Subject> =
        subjects.iter().map(|subject| (&subject.id, subject)).collect();
    let mut in_term = assessments
        .iter()
        .filter(|assessment| &assessment.student_id == student_id && assessment.term == term)
        .peekable();

    if in_term.peek().is_none() {
        return Err(GradeIssue::NoAssessments { term });
    }

    for assessment in in_term {
        if !assessment.value.is_finite()
            || !(0.0..=Assessment::MAX_VALUE).contains(&assessment.value)
        {
            return Err(GradeIssue::ValueOutOfRange {
                assessment: assessment.id.to_string(),
                value: assessment.value,
            });
        }
        if let Some(coefficient) = assessment.coefficient {
            if !valid_weight(coefficient) {
                return Err(GradeIssue::InvalidCoefficient {
                    assessment: assessment.id.to_string(),
                    coefficient,
                });
            }
        }
        let subject = catalog.get(&assessment.subject_id).ok_or_else(|| {
            GradeIssue::UnknownSubject {
                assessment: assessment.id.to_string(),
                subject: assessment.subject_id.clone(),
            }
        })?;
        if !valid_weight(subject.coefficient) {
            return Err(GradeIssue::InvalidSubjectCoefficient {
                subject: subject.id.clone(),
                coefficient: subject.coefficient,
            });
        }
    }

    Ok(())
}

fn valid_weight(weight: f64) -> bool {
    weight.is_finite() && weight > 0.0
}
