use serde::Serialize;

use super::averaging::round2;
use super::domain::{GradedStudent, StudentId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStudent {
    pub student_id: StudentId,
    pub general_average: f64,
    pub rank: u32,
}

/// Competition ranking of a cohort, best average first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CohortRanking {
    pub entries: Vec<RankedStudent>,
}

impl CohortRanking {
    pub fn rank_of(&self, student_id: &StudentId) -> Option<u32> {
        self.entries
            .iter()
            .find(|entry| &entry.student_id == student_id)
            .map(|entry| entry.rank)
    }

    pub fn cohort_size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Orders the cohort by general average and assigns "1224"-style ranks.
///
/// Ties compare the two-decimal averages exactly, so averages that display the same always
/// share a rank; the next distinct average is ranked by its position in the sorted list.
pub fn rank_cohort<T: GradedStudent>(members: &[T]) -> CohortRanking {
    let mut sorted: Vec<(&StudentId, f64)> = members
        .iter()
        .map(|member| (member.student_id(), round2(member.general_average())))
        .collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut entries: Vec<RankedStudent> = Vec::with_capacity(sorted.len());
    for (position, (student_id, average)) in sorted.into_iter().enumerate() {
        let rank = match entries.last() {
            Some(previous) if previous.general_average == average => previous.rank,
            _ => position as u32 + 1,
        };
        entries.push(RankedStudent {
            student_id: student_id.clone(),
            general_average: average,
            rank,
        });
    }

    CohortRanking { entries }
}
