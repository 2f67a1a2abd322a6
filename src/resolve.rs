use crate::filter::{DuplicatePair, MAX_SIMILARITY};
use rustc_hash::FxHashSet;
use serde::Serialize;

///
/// Indices removed by the keep-first policy: the `index2` of every pair.
///
/// Not transitive. With pairs (0, 1) and (1, 2) both 1 and 2 are removed even
/// when (0, 2) was never reported.
///
pub fn loser_indices<R>(pairs: &[DuplicatePair<R>]) -> FxHashSet<usize> {
    pairs.iter().map(|p| p.index2).collect()
}

///
/// Returns the records not marked as losers by any pair, in original order.
///
pub fn resolve<R: Clone>(records: &[R], pairs: &[DuplicatePair<R>]) -> Vec<R> {
    let losers = loser_indices(pairs);
    records
        .iter()
        .enumerate()
        .filter(|(idx, _)| !losers.contains(idx))
        .map(|(_, record)| record.clone())
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupStats {
    pub total_records: usize,
    pub duplicate_pairs: usize,
    /// Pairs with similarity 100.
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    pub removed_records: usize,
    pub clean_records: usize,
}

impl DedupStats {
    pub fn new<R>(total_records: usize, pairs: &[DuplicatePair<R>]) -> Self {
        let exact_matches = pairs
            .iter()
            .filter(|p| p.similarity == MAX_SIMILARITY)
            .count();
        let removed_records = loser_indices(pairs).len();
        DedupStats {
            total_records,
            duplicate_pairs: pairs.len(),
            exact_matches,
            fuzzy_matches: pairs.len() - exact_matches,
            removed_records,
            clean_records: total_records.saturating_sub(removed_records),
        }
    }
}
