use crate::infra::{GradebookSnapshot, InMemoryBulletinRepository, LogDispatcher};
use crate::report::{format_batch_report, format_statistics};
use bulletin_engine::bulletins::{
    BatchGenerationOrchestrator, BulletinId, BulletinLifecycle, GenerationOptions,
    GenerationRequest, GenerationScope,
};
use bulletin_engine::config::EngineConfig;
use bulletin_engine::error::AppError;
use bulletin_engine::grading::{
    Assessment, AssessmentId, ClassId, EvaluationKind, Period, PeriodId, Student, StudentId,
    Subject, SubjectId, Term, ViewerContext,
};
use chrono::NaiveDate;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Publish the generated drafts at the end of the demo
    #[arg(long)]
    pub(crate) publish: bool,
    /// Recalculate the first bulletin from current grades before publishing
    #[arg(long)]
    pub(crate) recalculate: bool,
}

const DEMO_CLASS: &str = "c-6a";
const DEMO_PERIOD: &str = "p-2025-t1";

pub(crate) fn run_demo(args: DemoArgs, engine: EngineConfig) -> Result<(), AppError> {
    let snapshot = sample_gradebook();
    let class_id = ClassId::new(DEMO_CLASS);
    let period_id = PeriodId::new(DEMO_PERIOD);

    let lifecycle = Arc::new(BulletinLifecycle::new(
        Arc::new(snapshot.clone()),
        Arc::new(InMemoryBulletinRepository::default()),
    ));
    let orchestrator =
        BatchGenerationOrchestrator::new(lifecycle.clone(), Arc::new(LogDispatcher), engine);

    println!("Bulletin generation demo");
    println!(
        "Class {} / {} ({} students, {} subjects, {} grades)",
        class_id,
        period_id,
        snapshot.students.len(),
        snapshot.subjects.len(),
        snapshot.assessments.len()
    );

    let report = orchestrator.generate(GenerationRequest {
        scope: GenerationScope::Class(class_id.clone()),
        period_id: period_id.clone(),
        options: GenerationOptions {
            produce_pdf: true,
            ..GenerationOptions::default()
        },
    })?;
    println!("\n{}", format_batch_report(&report));

    let statistics = lifecycle.cohort_statistics(&class_id, &period_id)?;
    println!("\n{}", format_statistics(&statistics));

    let guardian = ViewerContext::restricted("guardian-s02", [StudentId::new("s-02")]);
    for student in ["s-02", "s-01"] {
        let student_id = StudentId::new(student);
        match lifecycle.student_report(&guardian.verdict_for(&student_id), &student_id, &period_id)
        {
            Ok(average) => println!(
                "\nGuardian view of {}: {:.2} ({})",
                student_id,
                average.general_average,
                average.mention.label()
            ),
            Err(err) => println!("\nGuardian view of {student_id}: {err}"),
        }
    }

    if args.recalculate {
        if let Some(bulletin) = report.bulletins.first() {
            let refreshed = lifecycle.recalculate(&bulletin.id)?;
            println!(
                "\nRecalculated {}: {:.2} -> {:.2}",
                refreshed.id, bulletin.general_average, refreshed.general_average
            );
        }
    }

    if args.publish {
        let ids: Vec<BulletinId> = report.bulletins.iter().map(|b| b.id.clone()).collect();
        let publication = orchestrator.publish_many(&ids);
        println!(
            "\nPublished {} bulletins ({} failed)",
            publication.succeeded, publication.failed
        );
    }

    Ok(())
}

/// Small class used by the demo: four graded students and one without grades.
pub(crate) fn sample_gradebook() -> GradebookSnapshot {
    let class_id = ClassId::new(DEMO_CLASS);
    let students = [
        ("s-01", "Ama", "Mensah"),
        ("s-02", "Kofi", "Boateng"),
        ("s-03", "Esi", "Owusu"),
        ("s-04", "Yaw", "Asante"),
        ("s-05", "Akua", "Danso"),
    ]
    .into_iter()
    .map(|(id, first, last)| Student {
        id: StudentId::new(id),
        class_id: class_id.clone(),
        first_name: first.to_string(),
        last_name: last.to_string(),
    })
    .collect();

    let subjects = [
        ("math", "MATH", "Mathematics", 4.0),
        ("french", "FR", "French", 3.0),
        ("history", "HIST", "History-Geography", 2.0),
    ]
    .into_iter()
    .map(|(id, code, name, coefficient)| Subject {
        id: SubjectId::new(id),
        name: name.to_string(),
        code: code.to_string(),
        coefficient,
        active: true,
    })
    .collect();

    let grades: [(&str, &str, f64, Option<f64>, EvaluationKind); 13] = [
        ("s-01", "math", 16.0, None, EvaluationKind::Test),
        ("s-01", "math", 18.0, Some(2.0), EvaluationKind::Exam),
        ("s-01", "french", 14.5, None, EvaluationKind::Homework),
        ("s-01", "history", 15.0, None, EvaluationKind::Test),
        ("s-02", "math", 11.0, None, EvaluationKind::Test),
        ("s-02", "french", 13.0, Some(2.0), EvaluationKind::Exam),
        ("s-02", "history", 12.0, None, EvaluationKind::Homework),
        ("s-03", "math", 7.5, None, EvaluationKind::Test),
        ("s-03", "french", 10.0, None, EvaluationKind::Exam),
        ("s-03", "history", 9.0, None, EvaluationKind::Homework),
        ("s-04", "math", 11.0, None, EvaluationKind::Test),
        ("s-04", "french", 13.0, Some(2.0), EvaluationKind::Exam),
        ("s-04", "history", 12.0, None, EvaluationKind::Homework),
    ];
    let recorded_on = NaiveDate::from_ymd_opt(2025, 10, 20).unwrap_or(NaiveDate::MIN);
    let assessments = grades
        .into_iter()
        .enumerate()
        .map(|(index, (student, subject, value, coefficient, kind))| Assessment {
            id: AssessmentId::new(format!("demo-{:02}", index + 1)),
            student_id: StudentId::new(student),
            subject_id: SubjectId::new(subject),
            term: Term::First,
            value,
            coefficient,
            kind,
            recorded_on,
            updated_at: None,
        })
        .collect();

    GradebookSnapshot {
        periods: vec![Period {
            id: PeriodId::new(DEMO_PERIOD),
            term: Term::First,
            school_year: "2025-2026".to_string(),
            active: true,
        }],
        students,
        subjects,
        assessments,
    }
}
