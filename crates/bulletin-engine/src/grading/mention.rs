use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualitative label attached to a general average, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mention {
    Excellent,
    TresBien,
    Bien,
    AssezBien,
    Passable,
    Insuffisant,
}

/// Inclusive lower bounds, highest first. Anything below the last bound is `Insuffisant`.
const THRESHOLDS: [(f64, Mention); 5] = [
    (16.0, Mention::Excellent),
    (14.0, Mention::TresBien),
    (12.0, Mention::Bien),
    (10.0, Mention::AssezBien),
    (8.0, Mention::Passable),
];

impl Mention {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Excellent,
            Self::TresBien,
            Self::Bien,
            Self::AssezBien,
            Self::Passable,
            Self::Insuffisant,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::TresBien => "Très bien",
            Self::Bien => "Bien",
            Self::AssezBien => "Assez bien",
            Self::Passable => "Passable",
            Self::Insuffisant => "Insuffisant",
        }
    }

    /// Lowest average that earns this mention, `None` for the open-ended bottom bucket.
    pub fn lower_bound(self) -> Option<f64> {
        THRESHOLDS
            .iter()
            .find(|(_, mention)| *mention == self)
            .map(|(bound, _)| *bound)
    }
}

impl fmt::Display for Mention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps an average to its mention. Total over `f64`: NaN falls through to `Insuffisant`.
pub fn classify(average: f64) -> Mention {
    THRESHOLDS
        .iter()
        .find(|(bound, _)| average >= *bound)
        .map(|(_, mention)| *mention)
        .unwrap_or(Mention::Insuffisant)
}
