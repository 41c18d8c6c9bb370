use std::collections::BTreeMap;

use serde::Serialize;

use super::averaging::round2;
use super::domain::{ClassId, CohortKey, GradedStudent, PeriodId};
use super::mention::{classify, Mention};

/// Average a student needs to count as passing.
pub const PASS_MARK: f64 = 10.0;

/// Descriptive statistics over the general averages of one class in one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortStatistics {
    pub class_id: ClassId,
    pub period_id: PeriodId,
    pub student_count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub standard_deviation: f64,
    pub mention_distribution: BTreeMap<Mention, usize>,
    pub pass_rate: f64,
}

impl CohortStatistics {
    fn empty(cohort: CohortKey) -> Self {
        Self {
            class_id: cohort.class_id,
            period_id: cohort.period_id,
            student_count: 0,
            mean: 0.0,
            median: 0.0,
            min: 0.0,
            max: 0.0,
            standard_deviation: 0.0,
            mention_distribution: BTreeMap::new(),
            pass_rate: 0.0,
        }
    }
}

fn compute_median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

/// Computes cohort statistics. An empty cohort yields zeros and an empty distribution.
pub fn compute_cohort_statistics<T: GradedStudent>(
    cohort: CohortKey,
    members: &[T],
) -> CohortStatistics {
    if members.is_empty() {
        return CohortStatistics::empty(cohort);
    }

    let mut averages: Vec<f64> = members
        .iter()
        .map(|member| member.general_average())
        .collect();
    averages.sort_by(f64::total_cmp);

    let count = averages.len() as f64;
    let mean = averages.iter().sum::<f64>() / count;
    let variance = averages
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / count;
    let passing = averages.iter().filter(|value| **value >= PASS_MARK).count();

    let mut mention_distribution = BTreeMap::new();
    for average in &averages {
        *mention_distribution.entry(classify(*average)).or_insert(0) += 1;
    }

    CohortStatistics {
        class_id: cohort.class_id,
        period_id: cohort.period_id,
        student_count: averages.len(),
        mean: round2(mean),
        median: round2(compute_median(&averages)),
        min: round2(averages[0]),
        max: round2(averages[averages.len() - 1]),
        standard_deviation: round2(variance.sqrt()),
        mention_distribution,
        pass_rate: round2(100.0 * passing as f64 / count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::domain::StudentId;

    struct Entry(StudentId, f64);

    impl GradedStudent for Entry {
        fn student_id(&self) -> &StudentId {
            &self.0
        }

        fn general_average(&self) -> f64 {
            self.1
        }
    }

    fn key() -> CohortKey {
        CohortKey {
            class_id: ClassId::new("6A"),
            period_id: PeriodId::new("2025-T1"),
        }
    }

    fn cohort(averages: &[f64]) -> Vec<Entry> {
        averages
            .iter()
            .enumerate()
            .map(|(idx, avg)| Entry(StudentId::new(format!("s{idx}")), *avg))
            .collect()
    }

    #[test]
    fn odd_cohort_statistics() {
        let stats = compute_cohort_statistics(key(), &cohort(&[16.0, 8.0, 12.0, 14.0, 10.0]));

        assert_eq!(stats.student_count, 5);
        assert_eq!(stats.mean, 12.0);
        assert_eq!(stats.median, 12.0);
        assert_eq!(stats.min, 8.0);
        assert_eq!(stats.max, 16.0);
        assert_eq!(stats.standard_deviation, 2.83);
        assert_eq!(stats.pass_rate, 80.0);
        assert_eq!(stats.mention_distribution.get(&Mention::Excellent), Some(&1));
        assert_eq!(stats.mention_distribution.get(&Mention::Passable), Some(&1));
        assert_eq!(stats.mention_distribution.len(), 5);
    }

    #[test]
    fn even_cohort_median_averages_the_middle_pair() {
        let stats = compute_cohort_statistics(key(), &cohort(&[9.0, 11.0, 13.0, 7.0]));
        assert_eq!(stats.median, 10.0);
        assert_eq!(stats.pass_rate, 50.0);
        assert_eq!(
            stats.mention_distribution.get(&Mention::Insuffisant),
            Some(&1)
        );
    }

    #[test]
    fn single_student_has_no_spread() {
        let stats = compute_cohort_statistics(key(), &cohort(&[13.5]));
        assert_eq!(stats.standard_deviation, 0.0);
        assert_eq!(stats.min, stats.max);
        assert_eq!(stats.pass_rate, 100.0);
    }

    #[test]
    fn nan_average_does_not_depend_on_input_order() {
        for order in [[f64::NAN, 9.0, 12.0], [12.0, f64::NAN, 9.0], [9.0, 12.0, f64::NAN]] {
            let stats = compute_cohort_statistics(key(), &cohort(&order));
            assert_eq!(stats.min, 9.0);
            assert_eq!(stats.median, 12.0);
            assert!(stats.max.is_nan());
        }
    }

    #[test]
    fn empty_cohort_is_all_zero() {
        let stats = compute_cohort_statistics::<Entry>(key(), &[]);
        assert_eq!(stats.student_count, 0);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.median, 0.0);
        assert_eq!(stats.standard_deviation, 0.0);
        assert_eq!(stats.pass_rate, 0.0);
        assert!(stats.mention_distribution.is_empty());
        assert_eq!(stats.class_id, ClassId::new("6A"));
    }
}
