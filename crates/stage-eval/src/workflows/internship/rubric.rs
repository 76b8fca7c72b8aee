use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Qualitative dimension rated on the second page of the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricDimension {
    Implication,
    Openness,
    Quality,
}

const IMPLICATION_LABELS: [&str; 5] = [
    "Paresseux",
    "Le juste nécessaire",
    "Bonne",
    "Très forte",
    "Dépasse ses objectifs",
];

const OPENNESS_LABELS: [&str; 5] = [
    "Isolé(e) ou en opposition",
    "Renfermé(e) ou obtus",
    "Bonne",
    "Très bonne",
    "Excellente",
];

const QUALITY_LABELS: [&str; 5] = [
    "Médiocre",
    "Acceptable",
    "Bonne",
    "Très bonne",
    "Très professionnelle",
];

impl RubricDimension {
    pub const ALL: [RubricDimension; 3] = [
        RubricDimension::Implication,
        RubricDimension::Openness,
        RubricDimension::Quality,
    ];

    /// Declared labels, weakest first.
    pub fn labels(self) -> &'static [&'static str; 5] {
        match self {
            RubricDimension::Implication => &IMPLICATION_LABELS,
            RubricDimension::Openness => &OPENNESS_LABELS,
            RubricDimension::Quality => &QUALITY_LABELS,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RubricDimension::Implication => "Implication",
            RubricDimension::Openness => "Ouverture d'esprit",
            RubricDimension::Quality => "Qualité du travail",
        }
    }

    /// 1-based position of `label` in the declared set.
    fn level(self, label: &str) -> Option<u8> {
        self.labels()
            .iter()
            .position(|candidate| *candidate == label)
            .map(|index| index as u8 + 1)
    }
}

impl FromStr for RubricDimension {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "implication" => Ok(Self::Implication),
            "openness" | "ouverture" | "ouverture d'esprit" => Ok(Self::Openness),
            "quality" | "qualite" | "qualité" | "qualité du travail" => Ok(Self::Quality),
            other => Err(format!(
                "unknown rubric dimension '{other}' (expected implication, openness or quality)"
            )),
        }
    }
}

/// Lookup table converting a label to its numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricTable {
    /// Level 1 to 5, stored as the category value.
    #[default]
    WizardReset,
    /// Mark out of 20, four points per level.
    ScoreSheet,
}

impl RubricTable {
    /// Maps `label` to its score. Anything outside the declared set scores 0.
    pub fn value(self, dimension: RubricDimension, label: &str) -> u8 {
        let Some(level) = dimension.level(label) else {
            return 0;
        };

        match self {
            RubricTable::WizardReset => level,
            RubricTable::ScoreSheet => level * 4,
        }
    }

    /// Every declared label with its score, in declaration order.
    pub fn entries(self, dimension: RubricDimension) -> Vec<(&'static str, u8)> {
        dimension
            .labels()
            .iter()
            .map(|label| (*label, self.value(dimension, label)))
            .collect()
    }

    pub fn as_map(self, dimension: RubricDimension) -> BTreeMap<String, u8> {
        self.entries(dimension)
            .into_iter()
            .map(|(label, value)| (label.to_string(), value))
            .collect()
    }
}

impl FromStr for RubricTable {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "wizard_reset" | "wizard" | "level" => Ok(Self::WizardReset),
            "score_sheet" | "score" | "sheet" => Ok(Self::ScoreSheet),
            other => Err(format!(
                "unknown rubric table '{other}' (expected wizard-reset or score-sheet)"
            )),
        }
    }
}

/// Value used when the rating was left blank in the wizard.
pub const UNRATED_VALUE: u8 = 3;

/// Resolves the rating entered for `dimension`, defaulting blank answers.
pub fn rating_value(table: RubricTable, dimension: RubricDimension, raw: &str) -> u8 {
    if raw.trim().is_empty() {
        return match table {
            RubricTable::WizardReset => UNRATED_VALUE,
            RubricTable::ScoreSheet => UNRATED_VALUE * 4,
        };
    }
    table.value(dimension, raw)
}
