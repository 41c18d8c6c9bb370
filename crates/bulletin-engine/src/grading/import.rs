//! CSV import for gradebook exports.
//!
//! Expected header: `id,student_id,subject_id,term,value,coefficient,kind,recorded_on`.
//! `id` and `coefficient` may be left blank; a blank id is replaced by `csv-<line>`.

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use super::domain::{Assessment, AssessmentId, EvaluationKind, StudentId, SubjectId, Term};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read assessment export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid assessment CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: {reason}")]
    InvalidRow { line: u64, reason: String },
}

pub struct AssessmentImporter;

impl AssessmentImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Assessment>, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Assessment>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let mut assessments = Vec::new();

        for record in csv_reader.records() {
            let record = record?;
            let line = record.position().map(|pos| pos.line()).unwrap_or_default();
            let row: AssessmentRow = record.deserialize(Some(&headers))?;
            assessments.push(row.into_assessment(line)?);
        }

        Ok(assessments)
    }
}

#[derive(Debug, Deserialize)]
struct AssessmentRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    id: Option<String>,
    student_id: String,
    subject_id: String,
    term: String,
    value: f64,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    coefficient: Option<String>,
    kind: String,
    recorded_on: String,
}

impl AssessmentRow {
    fn into_assessment(self, line: u64) -> Result<Assessment, ImportError> {
        let invalid = |reason: String| ImportError::InvalidRow { line, reason };

        let term = self.term.parse::<Term>().map_err(invalid)?;
        let kind = self.kind.parse::<EvaluationKind>().map_err(invalid)?;
        let coefficient = self
            .coefficient
            .as_deref()
            .map(|raw| {
                raw.parse::<f64>()
                    .map_err(|err| invalid(format!("coefficient '{raw}' is not a number ({err})")))
            })
            .transpose()?;
        let recorded_on = NaiveDate::parse_from_str(&self.recorded_on, "%Y-%m-%d").map_err(|err| {
            invalid(format!(
                "failed to parse '{}' as YYYY-MM-DD ({err})",
                self.recorded_on
            ))
        })?;

        Ok(Assessment {
            id: AssessmentId(self.id.unwrap_or_else(|| format!("csv-{line}"))),
            student_id: StudentId(self.student_id),
            subject_id: SubjectId(self.subject_id),
            term,
            value: self.value,
            coefficient,
            kind,
            recorded_on,
            updated_at: None,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
