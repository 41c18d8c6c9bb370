use crate::infra::{GradebookSnapshot, InMemoryBulletinRepository, LogDispatcher};
use bulletin_engine::bulletins::{
    BatchError, BatchGenerationOrchestrator, BatchReport, BulkOperationReport, Bulletin,
    BulletinId, BulletinLifecycle, GenerationOptions, GenerationRequest, GenerationScope,
    GradebookSource,
};
use bulletin_engine::config::EngineConfig;
use bulletin_engine::error::AppError;
use bulletin_engine::grading::{
    compute_cohort_statistics, compute_student_averages, rank_cohort, ClassId, CohortKey,
    CohortRanking, CohortStatistics, Mention, PeriodId, Student, StudentAverage, StudentId,
};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct GenerateArgs {
    /// Gradebook snapshot (JSON with periods, students, subjects and assessments)
    #[arg(long)]
    pub(crate) gradebook: PathBuf,
    /// CSV export whose grades replace the snapshot's assessments
    #[arg(long)]
    pub(crate) assessments_csv: Option<PathBuf>,
    /// Grading period to generate bulletins for
    #[arg(long)]
    pub(crate) period: String,
    /// Generate for every student enrolled in this class
    #[arg(long, conflicts_with = "student", required_unless_present = "student")]
    pub(crate) class: Option<String>,
    /// Generate for this student (repeatable)
    #[arg(long)]
    pub(crate) student: Vec<String>,
    /// Queue a PDF rendering for each generated bulletin
    #[arg(long)]
    pub(crate) pdf: bool,
    /// Queue an e-mail for each generated bulletin
    #[arg(long)]
    pub(crate) email: bool,
    /// Skip the class ranking pass
    #[arg(long)]
    pub(crate) no_ranks: bool,
    /// Publish the generated drafts right away
    #[arg(long)]
    pub(crate) publish: bool,
    /// Print the report as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct StatsArgs {
    /// Gradebook snapshot (JSON with periods, students, subjects and assessments)
    #[arg(long)]
    pub(crate) gradebook: PathBuf,
    /// CSV export whose grades replace the snapshot's assessments
    #[arg(long)]
    pub(crate) assessments_csv: Option<PathBuf>,
    #[arg(long)]
    pub(crate) period: String,
    #[arg(long)]
    pub(crate) class: String,
    /// Print the statistics as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Serialize)]
struct GenerateOutput<'a> {
    report: &'a BatchReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    publication: Option<&'a BulkOperationReport>,
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    statistics: &'a CohortStatistics,
    ranking: &'a CohortRanking,
}

pub(crate) fn run_generate(args: GenerateArgs, engine: EngineConfig) -> Result<(), AppError> {
    let snapshot = GradebookSnapshot::load(&args.gradebook, args.assessments_csv.as_deref())?;
    let lifecycle = Arc::new(BulletinLifecycle::new(
        Arc::new(snapshot),
        Arc::new(InMemoryBulletinRepository::default()),
    ));
    let orchestrator = BatchGenerationOrchestrator::new(lifecycle, Arc::new(LogDispatcher), engine);

    let scope = match args.class {
        Some(class) => GenerationScope::Class(ClassId::new(class)),
        None => GenerationScope::Students(args.student.into_iter().map(StudentId::new).collect()),
    };
    let request = GenerationRequest {
        scope,
        period_id: PeriodId::new(args.period),
        options: GenerationOptions {
            produce_pdf: args.pdf,
            send_email: args.email,
            assign_ranks: !args.no_ranks,
        },
    };

    let report = orchestrator.generate(request)?;
    let publication = args.publish.then(|| {
        let ids: Vec<BulletinId> = report.bulletins.iter().map(|b| b.id.clone()).collect();
        orchestrator.publish_many(&ids)
    });

    if args.json {
        let output = GenerateOutput {
            report: &report,
            publication: publication.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", format_batch_report(&report));
        if let Some(publication) = &publication {
            println!(
                "Published: {} succeeded, {} failed",
                publication.succeeded, publication.failed
            );
            for failure in &publication.errors {
                println!("  {}: {}", failure.bulletin_id, failure.reason);
            }
        }
    }
    Ok(())
}

pub(crate) fn run_stats(args: StatsArgs) -> Result<(), AppError> {
    let snapshot = GradebookSnapshot::load(&args.gradebook, args.assessments_csv.as_deref())?;
    let class_id = ClassId::new(args.class);
    let period_id = PeriodId::new(args.period);

    let (statistics, ranking) = cohort_overview(&snapshot, &class_id, &period_id)?;

    if args.json {
        let output = StatsOutput {
            statistics: &statistics,
            ranking: &ranking,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", format_statistics(&statistics));
        println!("Ranking");
        for entry in &ranking.entries {
            let name = snapshot
                .students
                .iter()
                .find(|student| student.id == entry.student_id)
                .map(Student::display_name)
                .unwrap_or_default();
            println!(
                "  {:>3}. {:<12} {:<24} {:>6.2}",
                entry.rank,
                entry.student_id.as_str(),
                name,
                entry.general_average
            );
        }
    }
    Ok(())
}

/// Statistics and ranking straight from current grades; students without grades are left out.
pub(crate) fn cohort_overview(
    snapshot: &GradebookSnapshot,
    class_id: &ClassId,
    period_id: &PeriodId,
) -> Result<(CohortStatistics, CohortRanking), AppError> {
    let period = snapshot
        .period(period_id)
        .map_err(BatchError::from)?
        .ok_or_else(|| BatchError::PeriodNotFound(period_id.clone()))?;
    let roster = snapshot.class_roster(class_id).map_err(BatchError::from)?;
    if roster.is_empty() {
        return Err(BatchError::EmptyClass(class_id.clone()).into());
    }

    let averages: Vec<StudentAverage> = roster
        .iter()
        .map(|student| {
            compute_student_averages(
                &student.id,
                &snapshot.assessments,
                &snapshot.subjects,
                period.term,
            )
        })
        .filter(StudentAverage::has_grades)
        .collect();

    let key = CohortKey {
        class_id: class_id.clone(),
        period_id: period_id.clone(),
    };
    Ok((compute_cohort_statistics(key, &averages), rank_cohort(&averages)))
}

pub(crate) fn format_batch_report(report: &BatchReport) -> String {
    let mut lines = vec![format!(
        "Period {}: {} generated, {} failed",
        report.period_id, report.generated, report.failed
    )];

    for view in report.bulletins.iter().map(Bulletin::summary_view) {
        let rank = match (view.class_rank, view.total_students) {
            (Some(rank), Some(total)) => format!("{rank}/{total}"),
            _ => "-".to_string(),
        };
        lines.push(format!(
            "  {:<12} {:>6.2}  {:<12} rank {:<7} {:<10} {}",
            view.student_id.as_str(),
            view.general_average,
            view.mention,
            rank,
            view.status,
            view.bulletin_id
        ));
    }

    if !report.errors.is_empty() {
        lines.push("Failures".to_string());
        for failure in &report.errors {
            lines.push(format!("  {}: {}", failure.student_id, failure.reason));
        }
    }
    if !report.warnings.is_empty() {
        lines.push("Warnings".to_string());
        for warning in &report.warnings {
            lines.push(format!("  {warning}"));
        }
    }

    lines.join("\n")
}

pub(crate) fn format_statistics(statistics: &CohortStatistics) -> String {
    let mut lines = vec![
        format!(
            "Class {} / {}: {} students",
            statistics.class_id, statistics.period_id, statistics.student_count
        ),
        format!(
            "  mean {:.2}  median {:.2}  min {:.2}  max {:.2}  sd {:.2}",
            statistics.mean,
            statistics.median,
            statistics.min,
            statistics.max,
            statistics.standard_deviation
        ),
        format!("  pass rate {:.2}%", statistics.pass_rate),
    ];

    for mention in Mention::ordered() {
        let count = statistics
            .mention_distribution
            .get(&mention)
            .copied()
            .unwrap_or(0);
        let threshold = match mention.lower_bound() {
            Some(bound) => format!(">= {bound}"),
            None => "below".to_string(),
        };
        lines.push(format!("  {:<12} {:<6} {count}", mention.label(), threshold));
    }

    lines.join("\n")
}
