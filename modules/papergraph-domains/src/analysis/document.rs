//! The structured analysis document produced by the LLM collaborator.
//!
//! Persisted opaquely as the task result; only the ratings are interpreted.

use std::collections::BTreeMap;

use papergraph_common::{PaperGraphError, Result};
use serde::{Deserialize, Serialize};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicInfo {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub publication_date: String,
    #[serde(default)]
    pub research_field: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub methods: String,
    #[serde(default)]
    pub key_findings: String,
    #[serde(default)]
    pub conclusion: String,
}

/// One quality dimension: a 1..=5 rating plus free-text justification fields,
/// whose keys differ per dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityDimension {
    pub rating: i32,
    #[serde(flatten)]
    pub notes: BTreeMap<String, String>,
}

impl QualityDimension {
    pub fn rated(rating: i32) -> Self {
        Self {
            rating,
            notes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuality {
    pub research_question_importance: QualityDimension,
    pub innovation: QualityDimension,
    pub methodology_rigor: QualityDimension,
    pub results_validity_reproducibility: QualityDimension,
    pub data_analysis_depth_breadth: QualityDimension,
    pub practical_application_value: QualityDimension,
    pub future_research_inspiration: QualityDimension,
}

impl ContentQuality {
    /// Every dimension rated the same. Handy for fixtures.
    pub fn uniform(rating: i32) -> Self {
        Self {
            research_question_importance: QualityDimension::rated(rating),
            innovation: QualityDimension::rated(rating),
            methodology_rigor: QualityDimension::rated(rating),
            results_validity_reproducibility: QualityDimension::rated(rating),
            data_analysis_depth_breadth: QualityDimension::rated(rating),
            practical_application_value: QualityDimension::rated(rating),
            future_research_inspiration: QualityDimension::rated(rating),
        }
    }

    pub fn dimensions(&self) -> [(&'static str, &QualityDimension); 7] {
        [
            ("researchQuestionImportance", &self.research_question_importance),
            ("innovation", &self.innovation),
            ("methodologyRigor", &self.methodology_rigor),
            ("resultsValidityReproducibility", &self.results_validity_reproducibility),
            ("dataAnalysisDepthBreadth", &self.data_analysis_depth_breadth),
            ("practicalApplicationValue", &self.practical_application_value),
            ("futureResearchInspiration", &self.future_research_inspiration),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDocument {
    pub basic_info: BasicInfo,
    pub summary: Summary,
    pub content_quality: ContentQuality,
}

impl AnalysisDocument {
    /// Parse and validate a document as returned by the collaborator.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let doc: AnalysisDocument = serde_json::from_value(value)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, dimension) in self.content_quality.dimensions() {
            if !(MIN_RATING..=MAX_RATING).contains(&dimension.rating) {
                return Err(PaperGraphError::validation(format!(
                    "{name} rating must be between {MIN_RATING} and {MAX_RATING}, got {}",
                    dimension.rating
                )));
            }
        }
        Ok(())
    }

    /// How strongly the analysis suggests reading the paper itself: the sum
    /// of the seven ratings (7..=35).
    pub fn suggestion_strength(&self) -> i32 {
        self.content_quality
            .dimensions()
            .iter()
            .map(|(_, d)| d.rating)
            .sum()
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
