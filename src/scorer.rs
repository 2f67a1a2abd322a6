use crate::error::{DedupError, ScoreError};
use crate::record::FieldLookup;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strsim::{jaro_winkler, normalized_damerau_levenshtein, normalized_levenshtein};

/// Maximum number of comparison fields.
pub const MAX_KEYS: usize = 2;

///
/// Scores a pair of records. `Ok(None)` means the pair cannot be compared
/// (missing or empty comparison data) and must never be reported as a match.
///
pub trait PairScorer<R> {
    fn score(&self, record1: &R, record2: &R) -> Result<Option<u8>, ScoreError>;
}

///
/// Approximate string matcher. Every variant is case-sensitive and treats
/// whitespace as significant.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Matcher {
    #[default]
    Levenshtein,
    DamerauLevenshtein,
    JaroWinkler,
}

impl Matcher {
    ///
    /// Normalized distance in `[0, 1]`: 0 for identical strings, 1 for strings the
    /// matcher considers unrelated.
    ///
    pub fn distance(&self, a: &str, b: &str) -> f64 {
        let similarity = match self {
            Matcher::Levenshtein => normalized_levenshtein(a, b),
            Matcher::DamerauLevenshtein => normalized_damerau_levenshtein(a, b),
            Matcher::JaroWinkler => jaro_winkler(a, b),
        };
        (1.0 - similarity).clamp(0.0, 1.0)
    }
}

impl FromStr for Matcher {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "levenshtein" => Ok(Matcher::Levenshtein),
            "damerau-levenshtein" => Ok(Matcher::DamerauLevenshtein),
            "jaro-winkler" => Ok(Matcher::JaroWinkler),
            other => Err(DedupError::ScorerInit(format!("unknown matcher '{other}'"))),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Matcher::Levenshtein => "levenshtein",
            Matcher::DamerauLevenshtein => "damerau-levenshtein",
            Matcher::JaroWinkler => "jaro-winkler",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScorerConfig {
    pub matcher: Matcher,
    /// Comparison strings longer than this (in chars) fail the pair.
    pub max_comparison_len: Option<usize>,
}

///
/// The ordered, non-empty set of one or two field names a scorer compares.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySet(Vec<String>);

impl KeySet {
    pub fn new<I, S>(keys: I) -> Result<Self, DedupError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(DedupError::InvalidInput(
                "at least one comparison field is required".to_string(),
            ));
        }
        if keys.len() > MAX_KEYS {
            return Err(DedupError::InvalidInput(format!(
                "at most {MAX_KEYS} comparison fields are supported, got {}",
                keys.len()
            )));
        }
        if keys.iter().any(|k| k.is_empty()) {
            return Err(DedupError::InvalidInput(
                "comparison field names must not be empty".to_string(),
            ));
        }
        if keys.len() == 2 && keys[0] == keys[1] {
            return Err(DedupError::InvalidInput(format!(
                "comparison field '{}' is listed twice",
                keys[0]
            )));
        }
        Ok(KeySet(keys))
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    ///
    /// The text compared for `record`: the single field's value, or both values
    /// joined by a space. `None` if any key is absent or the result is empty.
    ///
    pub fn comparison_string<R: FieldLookup>(&self, record: &R) -> Option<String> {
        let mut parts = Vec::with_capacity(self.0.len());
        for key in &self.0 {
            parts.push(record.field(key)?);
        }
        let joined = parts.join(" ");
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

pub struct FuzzyScorer {
    keys: KeySet,
    matcher: Matcher,
    max_comparison_len: Option<usize>,
}

impl FuzzyScorer {
    pub fn new(keys: KeySet, config: &ScorerConfig) -> Result<Self, DedupError> {
        if config.max_comparison_len == Some(0) {
            return Err(DedupError::ScorerInit(
                "max comparison length must be positive".to_string(),
            ));
        }
        Ok(FuzzyScorer {
            keys,
            matcher: config.matcher,
            max_comparison_len: config.max_comparison_len,
        })
    }

    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    ///
    /// Similarity of two comparison strings, `round((1 - r) * 100)`. The operands
    /// are put in lexicographic order first so the result never depends on which
    /// record came first.
    ///
    pub fn similarity(&self, a: &str, b: &str) -> Result<u8, ScoreError> {
        if let Some(max) = self.max_comparison_len {
            for s in [a, b] {
                let len = s.chars().count();
                if len > max {
                    return Err(ScoreError::TooLong { len, max });
                }
            }
        }
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let r = self.matcher.distance(first, second);
        Ok(((1.0 - r) * 100.0).round().clamp(0.0, 100.0) as u8)
    }
}

impl<R: FieldLookup> PairScorer<R> for FuzzyScorer {
    fn score(&self, record1: &R, record2: &R) -> Result<Option<u8>, ScoreError> {
        let (a, b) = match (
            self.keys.comparison_string(record1),
            self.keys.comparison_string(record2),
        ) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(None),
        };
        self.similarity(&a, &b).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use proptest::prelude::*;

    fn title(t: &str) -> Record {
        Record::new().with("Title", t)
    }

    fn scorer(keys: &[&str]) -> FuzzyScorer {
        FuzzyScorer::new(KeySet::new(keys.iter().copied()).unwrap(), &ScorerConfig::default())
            .unwrap()
    }

    #[test]
    fn near_identical_titles_score_high() {
        let s = scorer(&["Title"]);
        let score = s
            .score(
                &title("Deep Learning in Healthcare"),
                &title("Deep Learning in Health Care"),
            )
            .unwrap()
            .unwrap();
        assert!(score >= 85, "got {score}");
        let unrelated = s
            .score(&title("Deep Learning in Healthcare"), &title("Unrelated Topic"))
            .unwrap()
            .unwrap();
        assert!(unrelated < 50, "got {unrelated}");
    }

    #[test]
    fn matching_is_case_sensitive() {
        let s = scorer(&["Title"]);
        assert_eq!(s.score(&title("X"), &title("X")).unwrap(), Some(100));
        assert_eq!(s.score(&title("X"), &title("x")).unwrap(), Some(0));
    }

    #[test]
    fn two_keys_join_with_space() {
        let keys = KeySet::new(["First", "Last"]).unwrap();
        let rec = Record::new().with("Last", "Lovelace").with("First", "Ada");
        assert_eq!(keys.comparison_string(&rec).as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn missing_or_empty_fields_skip_the_pair() {
        let s = scorer(&["Title"]);
        let blank = Record::new().with("Title", "");
        let absent = Record::new().with("Doi", "10.1/x");
        assert_eq!(s.score(&title("X"), &blank).unwrap(), None);
        assert_eq!(s.score(&absent, &title("X")).unwrap(), None);

        let two = scorer(&["First", "Last"]);
        let half = Record::new().with("First", "Ada");
        assert_eq!(two.score(&half, &half).unwrap(), None);
    }

    #[test]
    fn key_set_validation() {
        assert!(matches!(
            KeySet::new(Vec::<String>::new()),
            Err(DedupError::InvalidInput(_))
        ));
        assert!(matches!(
            KeySet::new(["a", "b", "c"]),
            Err(DedupError::InvalidInput(_))
        ));
        assert!(matches!(KeySet::new(["a", "a"]), Err(DedupError::InvalidInput(_))));
        assert!(KeySet::new(["a", "b"]).is_ok());
    }

    #[test]
    fn bad_configuration_fails_construction() {
        assert!(matches!(
            "soundex".parse::<Matcher>(),
            Err(DedupError::ScorerInit(_))
        ));
        let config = ScorerConfig {
            max_comparison_len: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            FuzzyScorer::new(KeySet::new(["Title"]).unwrap(), &config),
            Err(DedupError::ScorerInit(_))
        ));
    }

    #[test]
    fn over_long_strings_fail_the_pair() {
        let config = ScorerConfig {
            max_comparison_len: Some(4),
            ..Default::default()
        };
        let s = FuzzyScorer::new(KeySet::new(["Title"]).unwrap(), &config).unwrap();
        assert_eq!(
            s.score(&title("abcd"), &title("abcde")),
            Err(ScoreError::TooLong { len: 5, max: 4 })
        );
        assert_eq!(s.score(&title("abcd"), &title("abcd")), Ok(Some(100)));
    }

    #[test]
    fn matcher_names_round_trip() {
        for m in [
            Matcher::Levenshtein,
            Matcher::DamerauLevenshtein,
            Matcher::JaroWinkler,
        ] {
            assert_eq!(m.to_string().parse::<Matcher>().unwrap(), m);
        }
    }

    proptest! {
        #[test]
        fn score_is_symmetric(a in "[a-zA-Z ]{0,24}", b in "[a-zA-Z ]{0,24}") {
            let matchers = [
                Matcher::Levenshtein,
                Matcher::DamerauLevenshtein,
                Matcher::JaroWinkler,
            ];
            for matcher in matchers {
                let config = ScorerConfig { matcher, max_comparison_len: None };
                let s = FuzzyScorer::new(KeySet::new(["Title"]).unwrap(), &config).unwrap();
                prop_assert_eq!(
                    s.score(&title(&a), &title(&b)).unwrap(),
                    s.score(&title(&b), &title(&a)).unwrap()
                );
            }
        }

        #[test]
        fn identical_strings_score_100(a in "[a-zA-Z0-9 ]{1,24}") {
            let s = scorer(&["Title"]);
            prop_assert_eq!(s.score(&title(&a), &title(&a)).unwrap(), Some(100));
        }
    }
}
