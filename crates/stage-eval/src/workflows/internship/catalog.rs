use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::rubric::RubricDimension;

/// Category evaluated on every submission, scored from one wizard rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    pub dimension: RubricDimension,
}

/// Competency evaluated on every submission with a fixed default score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencySpec {
    pub name: String,
    pub default_score: f64,
}

/// Which categories and competencies a submission attaches to its appreciation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCatalog {
    #[serde(default)]
    pub categories: Vec<CategorySpec>,
    #[serde(default)]
    pub competencies: Vec<CompetencySpec>,
}

impl Default for EvaluationCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl EvaluationCatalog {
    pub fn standard() -> Self {
        let categories = RubricDimension::ALL
            .into_iter()
            .map(|dimension| CategorySpec {
                name: dimension.label().to_string(),
                dimension,
            })
            .collect();

        let competencies = [
            "Communication",
            "Travail en équipe",
            "Résolution de problèmes",
            "Autonomie",
        ]
        .into_iter()
        .map(|name| CompetencySpec {
            name: name.to_string(),
            default_score: 3.0,
        })
        .collect();

        Self {
            categories,
            competencies,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(raw).map_err(CatalogError::Parse)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Titles are the natural keys of their backend table, so each list must
    /// hold unique, non-blank titles. A category may share a competency's title.
    pub fn validate(&self) -> Result<(), CatalogError> {
        unique_titles(self.categories.iter().map(|spec| spec.name.as_str()))?;
        unique_titles(self.competencies.iter().map(|spec| spec.name.as_str()))
    }

    pub fn evaluation_comment(name: &str) -> String {
        format!("Évaluation pour {name}")
    }
}

fn unique_titles<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), CatalogError> {
    let mut seen = std::collections::BTreeSet::new();
    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(CatalogError::BlankName);
        }
        if !seen.insert(trimmed) {
            return Err(CatalogError::DuplicateName(trimmed.to_string()));
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unable to read evaluation catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid evaluation catalog: {0}")]
    Parse(serde_json::Error),
    #[error("evaluation catalog contains a blank title")]
    BlankName,
    #[error("evaluation catalog lists '{0}' more than once")]
    DuplicateName(String),
}
