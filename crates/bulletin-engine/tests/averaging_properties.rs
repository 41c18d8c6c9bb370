//! Property checks for the pure grade computations.

use bulletin_engine::grading::{
    classify, compute_student_averages, rank_cohort, round2, Assessment, AssessmentId,
    EvaluationKind, GradedStudent, Mention, StudentId, Subject, SubjectId, Term,
};
use chrono::NaiveDate;
use proptest::prelude::*;

fn catalog() -> Vec<Subject> {
    ["math", "french", "history"]
        .iter()
        .zip([4.0, 3.0, 2.0])
        .map(|(id, coefficient)| Subject {
            id: SubjectId::new(*id),
            name: id.to_string(),
            code: id.to_ascii_uppercase(),
            coefficient,
            active: true,
        })
        .collect()
}

fn grade_strategy() -> impl Strategy<Value = (usize, f64, Option<f64>)> {
    (
        0usize..3,
        0.0f64..=20.0,
        prop::option::of(prop_oneof![Just(0.5), Just(1.0), Just(2.0), Just(3.0)]),
    )
}

fn to_assessments(student: &StudentId, grades: &[(usize, f64, Option<f64>)]) -> Vec<Assessment> {
    let subjects = catalog();
    grades
        .iter()
        .enumerate()
        .map(|(index, (subject, value, coefficient))| Assessment {
            id: AssessmentId::new(format!("p-{index}")),
            student_id: student.clone(),
            subject_id: subjects[*subject].id.clone(),
            term: Term::Second,
            value: *value,
            coefficient: *coefficient,
            kind: EvaluationKind::Test,
            recorded_on: NaiveDate::from_ymd_opt(2026, 2, 2).expect("valid date"),
            updated_at: None,
        })
        .collect()
}

struct Scored(StudentId, f64);

impl GradedStudent for Scored {
    fn student_id(&self) -> &StudentId {
        &self.0
    }

    fn general_average(&self) -> f64 {
        self.1
    }
}

proptest! {
    #[test]
    fn averages_stay_on_the_twenty_point_scale(
        grades in prop::collection::vec(grade_strategy(), 1..24)
    ) {
        let student = StudentId::new("s-prop");
        let assessments = to_assessments(&student, &grades);

        let average = compute_student_averages(&student, &assessments, &catalog(), Term::Second);

        prop_assert!((0.0..=20.0).contains(&average.general_average));
        for subject in &average.subjects {
            prop_assert!((0.0..=20.0).contains(&subject.average));
        }
        prop_assert_eq!(average.total_assessments, grades.len());
        prop_assert_eq!(average.mention, classify(average.general_average));
    }

    #[test]
    fn assessment_order_does_not_change_the_result(
        grades in prop::collection::vec(grade_strategy(), 1..16)
    ) {
        let student = StudentId::new("s-prop");
        let forward = to_assessments(&student, &grades);
        let mut backward = forward.clone();
        backward.reverse();

        let a = compute_student_averages(&student, &forward, &catalog(), Term::Second);
        let b = compute_student_averages(&student, &backward, &catalog(), Term::Second);

        prop_assert_eq!(a.general_average, b.general_average);
        prop_assert_eq!(a.mention, b.mention);
    }

    #[test]
    fn classification_is_monotonic(a in 0.0f64..=20.0, b in 0.0f64..=20.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(classify(low) >= classify(high));
        prop_assert!(Mention::ordered().contains(&classify(low)));
    }

    #[test]
    fn ranks_follow_averages_and_ties_share(
        averages in prop::collection::vec(0u32..=2000, 1..30)
    ) {
        let cohort: Vec<Scored> = averages
            .iter()
            .enumerate()
            .map(|(index, hundredths)| {
                Scored(StudentId::new(format!("s-{index:03}")), f64::from(*hundredths) / 100.0)
            })
            .collect();

        let ranking = rank_cohort(&cohort);

        prop_assert_eq!(ranking.cohort_size(), cohort.len());
        for member in &cohort {
            let rank = ranking.rank_of(&member.0).expect("every member ranked");
            let better = cohort
                .iter()
                .filter(|other| round2(other.1) > round2(member.1))
                .count() as u32;
            prop_assert_eq!(rank, better + 1);
        }
    }
}
