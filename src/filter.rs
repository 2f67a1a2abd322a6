use crate::error::DedupError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Highest possible similarity.
pub const MAX_SIMILARITY: u8 = 100;

/// Index pair plus similarity, before the records are attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScoredPair {
    pub index1: usize,
    pub index2: usize,
    pub similarity: u8,
}

///
/// A pair of records judged to be duplicates. `index1 < index2` always holds and
/// `similarity` is at least the threshold of the run that produced it.
///
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePair<R> {
    pub index1: usize,
    pub index2: usize,
    pub record1: R,
    pub record2: R,
    pub similarity: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThresholdFilter {
    threshold: u8,
}

impl ThresholdFilter {
    pub fn new(threshold: u8) -> Result<Self, DedupError> {
        if threshold > MAX_SIMILARITY {
            return Err(DedupError::InvalidInput(format!(
                "threshold must be between 0 and {MAX_SIMILARITY}, got {threshold}"
            )));
        }
        Ok(ThresholdFilter { threshold })
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn accepts(&self, similarity: u8) -> bool {
        similarity >= self.threshold
    }

    ///
    /// Keeps the accepted pairs and orders them by similarity descending, then
    /// `index1`, then `index2`.
    ///
    pub fn apply<I>(&self, scored: I) -> Vec<ScoredPair>
    where
        I: IntoIterator<Item = ScoredPair>,
    {
        let mut kept: Vec<ScoredPair> = scored
            .into_iter()
            .filter(|p| self.accepts(p.similarity))
            .collect();
        sort_pairs(&mut kept);
        kept
    }
}

fn sort_pairs(pairs: &mut [ScoredPair]) {
    pairs.sort_unstable_by(compare);
}

fn compare(a: &ScoredPair, b: &ScoredPair) -> Ordering {
    b.similarity
        .cmp(&a.similarity)
        .then(a.index1.cmp(&b.index1))
        .then(a.index2.cmp(&b.index2))
}

///
/// Attaches owned copies of the records to each scored pair.
///
pub fn materialize<R: Clone>(records: &[R], scored: &[ScoredPair]) -> Vec<DuplicatePair<R>> {
    scored
        .iter()
        .map(|p| DuplicatePair {
            index1: p.index1,
            index2: p.index2,
            record1: records[p.index1].clone(),
            record2: records[p.index2].clone(),
            similarity: p.similarity,
        })
        .collect()
}
