use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{Assessment, GradedStudent, StudentId, Subject, SubjectId, Term};
use super::mention::{classify, Mention};

/// Per-subject result for one student and term. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectAverage {
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub subject_code: String,
    pub coefficient: f64,
    pub assessments: Vec<Assessment>,
    pub average: f64,
    pub assessment_count: usize,
}

/// Aggregate for one student over one term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAverage {
    pub student_id: StudentId,
    pub term: Term,
    pub general_average: f64,
    pub subjects: Vec<SubjectAverage>,
    pub mention: Mention,
    pub total_assessments: usize,
}

impl StudentAverage {
    /// True when at least one subject contributed to the general average.
    pub fn has_grades(&self) -> bool {
        self.subjects.iter().any(|subject| subject.assessment_count > 0)
    }
}

impl GradedStudent for StudentAverage {
    fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    fn general_average(&self) -> f64 {
        self.general_average
    }
}

/// Rounds to two decimals, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn weighted_mean<I>(pairs: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (weighted_sum, weight_total) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(sum, total), (value, weight)| {
            (sum + value * weight, total + weight)
        });

    if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    }
}

/// Coefficient-weighted mean of the given assessments; 0 for an empty list.
pub fn compute_subject_average<'a, I>(assessments: I) -> f64
where
    I: IntoIterator<Item = &'a Assessment>,
{
    weighted_mean(
        assessments
            .into_iter()
            .map(|assessment| (assessment.value, assessment.weight())),
    )
}

/// Coefficient-weighted mean across subjects that have at least one assessment.
///
/// Ungraded subjects are removed from the divisor rather than counted as zero.
pub fn compute_general_average(subject_averages: &[SubjectAverage]) -> f64 {
    weighted_mean(
        subject_averages
            .iter()
            .filter(|subject| subject.assessment_count > 0)
            .map(|subject| (subject.average, subject.coefficient)),
    )
}

/// Builds the full per-subject and general picture for `student_id` in `term`.
///
/// Intermediate values keep full precision; every figure in the returned aggregate is rounded
/// to two decimals exactly once.
pub fn compute_student_averages(
    student_id: &StudentId,
    assessments: &[Assessment],
    subjects: &[Subject],
    term: Term,
) -> StudentAverage {
    let catalog: HashMap<&SubjectId, &Subject> =
        subjects.iter().map(|subject| (&subject.id, subject)).collect();

    let mut grouped: BTreeMap<&SubjectId, Vec<&Assessment>> = BTreeMap::new();
    for assessment in assessments
        .iter()
        .filter(|assessment| &assessment.student_id == student_id && assessment.term == term)
    {
        if !catalog.contains_key(&assessment.subject_id) {
            warn!(
                student = %student_id,
                assessment = %assessment.id,
                subject = %assessment.subject_id,
                "skipping assessment for unknown subject"
            );
            continue;
        }
        grouped
            .entry(&assessment.subject_id)
            .or_default()
            .push(assessment);
    }

    let mut subject_averages: Vec<SubjectAverage> = grouped
        .into_iter()
        .filter_map(|(subject_id, entries)| {
            let subject = catalog.get(subject_id)?;
            Some(SubjectAverage {
                subject_id: subject.id.clone(),
                subject_name: subject.name.clone(),
                subject_code: subject.code.clone(),
                coefficient: subject.coefficient,
                average: compute_subject_average(entries.iter().copied()),
                assessment_count: entries.len(),
                assessments: entries.into_iter().cloned().collect(),
            })
        })
        .collect();

    subject_averages.sort_by(|a, b| {
        a.subject_code
            .cmp(&b.subject_code)
            .then_with(|| a.subject_id.cmp(&b.subject_id))
    });

    let general_average = round2(compute_general_average(&subject_averages));
    let total_assessments = subject_averages
        .iter()
        .map(|subject| subject.assessment_count)
        .sum();

    for subject in &mut subject_averages {
        subject.average = round2(subject.average);
    }

    debug!(
        student = %student_id,
        %term,
        subjects = subject_averages.len(),
        general_average,
        "computed student averages"
    );

    StudentAverage {
        student_id: student_id.clone(),
        term,
        general_average,
        mention: classify(general_average),
        subjects: subject_averages,
        total_assessments,
    }
}
