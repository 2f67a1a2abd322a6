use crate::detect::DetectOptions;
use crate::error::DedupError;
use crate::record::Article;
use crate::scorer::ScorerConfig;
use serde::{Deserialize, Serialize};
use serde_json::Number;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DataFile {
    pub bucket: String,
    pub key: String,
}

/// Record shape of the input file, chosen once per request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DetectMode {
    /// Arbitrary columns; `columns` names the comparison fields.
    #[default]
    General,
    /// Bibliographic rows with mandatory `Title` and `Doi`, compared on `Title`.
    Articles,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectConfig {
    pub data: DataFile,
    #[serde(default)]
    pub mode: DetectMode,
    #[serde(default)]
    pub columns: Vec<String>,
    /// Kept as a raw number so a fractional or negative value is reported
    /// as bad input instead of failing the whole event.
    #[serde(default)]
    pub threshold: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_comparison_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_matches_per_record: Option<usize>,
}

impl DetectConfig {
    pub fn keys(&self) -> Vec<String> {
        match self.mode {
            DetectMode::General => self.columns.clone(),
            DetectMode::Articles => vec![Article::TITLE.to_string()],
        }
    }

    pub fn detect_options(&self) -> Result<DetectOptions, DedupError> {
        let threshold = self
            .threshold
            .as_ref()
            .ok_or_else(|| DedupError::InvalidInput("threshold is required".to_string()))?;
        let threshold = threshold
            .as_u64()
            .and_then(|t| u8::try_from(t).ok())
            .filter(|t| *t <= 100)
            .ok_or_else(|| {
                DedupError::InvalidInput(format!(
                    "threshold must be a whole number between 0 and 100, got {threshold}"
                ))
            })?;
        let scorer = ScorerConfig {
            matcher: match &self.matcher {
                Some(name) => name.parse()?,
                None => Default::default(),
            },
            max_comparison_len: self.max_comparison_len,
        };
        let mut options = DetectOptions::new(self.keys(), threshold).with_scorer(scorer);
        options.batch_size = self.batch_size;
        Ok(options)
    }
}
