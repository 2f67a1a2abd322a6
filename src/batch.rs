use crate::error::DedupError;
use crate::filter::{ScoredPair, ThresholdFilter};
use crate::pairs::{pair_count, PairIter};
use crate::scorer::PairScorer;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Pairs per batch for ordinary runs.
pub const DEFAULT_BATCH_SIZE: usize = 5_000;
/// Pairs per batch once a run exceeds `LARGE_RUN_PAIRS`.
pub const LARGE_RUN_BATCH_SIZE: usize = 1_000;
pub const LARGE_RUN_PAIRS: usize = 1_000_000;

pub fn default_batch_size(total_pairs: usize) -> usize {
    if total_pairs > LARGE_RUN_PAIRS {
        LARGE_RUN_BATCH_SIZE
    } else {
        DEFAULT_BATCH_SIZE
    }
}

///
/// Shared cancellation signal, checked once at every batch boundary.
///
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub batches: usize,
    pub pairs_scored: usize,
    /// Pairs with a missing or empty comparison field.
    pub pairs_skipped: usize,
    pub pairs_failed: usize,
}

/// Outcome of one call to [`BatchRunner::next_batch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchReport {
    /// 1-based number of the batch just processed.
    pub batch: usize,
    pub total_batches: usize,
    pub progress: u8,
    pub matches: usize,
    pub failures: usize,
}

/// Accepted pairs in output order plus counters for the whole run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scan {
    pub pairs: Vec<ScoredPair>,
    pub stats: RunStats,
}

///
/// Scores the pair sequence of a record slice one bounded batch at a time.
///
/// The runner holds no scheduler of its own: callers advance it with
/// [`next_batch`](Self::next_batch) from whatever loop suits them, or use
/// [`run`](Self::run) / [`run_blocking`](Self::run_blocking).
///
pub struct BatchRunner<'a, R, S> {
    records: &'a [R],
    scorer: &'a S,
    filter: ThresholdFilter,
    pairs: PairIter,
    batch_size: usize,
    total_batches: usize,
    processed_batches: usize,
    matches: Vec<ScoredPair>,
    stats: RunStats,
}

impl<'a, R, S: PairScorer<R>> BatchRunner<'a, R, S> {
    pub fn new(
        records: &'a [R],
        scorer: &'a S,
        filter: ThresholdFilter,
        batch_size: Option<usize>,
    ) -> Result<Self, DedupError> {
        let total_pairs = pair_count(records.len());
        let batch_size = batch_size.unwrap_or_else(|| default_batch_size(total_pairs));
        if batch_size == 0 {
            return Err(DedupError::InvalidInput(
                "batch size must be positive".to_string(),
            ));
        }
        Ok(BatchRunner {
            records,
            scorer,
            filter,
            pairs: PairIter::new(records.len()),
            batch_size,
            total_batches: total_pairs.div_ceil(batch_size),
            processed_batches: 0,
            matches: Vec::new(),
            stats: RunStats::default(),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn total_batches(&self) -> usize {
        self.total_batches
    }

    pub fn processed_batches(&self) -> usize {
        self.processed_batches
    }

    pub fn is_finished(&self) -> bool {
        self.processed_batches >= self.total_batches
    }

    /// Percentage of batches processed; 100 for a run with nothing to score.
    pub fn progress(&self) -> u8 {
        if self.total_batches == 0 {
            return 100;
        }
        let ratio = self.processed_batches as f64 / self.total_batches as f64;
        (ratio * 100.0).round() as u8
    }

    ///
    /// Scores the next batch synchronously. Matches are filtered as they are
    /// scored; a pair whose scoring fails is logged and dropped. Returns `None`
    /// once every batch has been processed.
    ///
    pub fn next_batch(&mut self) -> Option<BatchReport> {
        if self.is_finished() {
            return None;
        }
        let mut matches = 0;
        let mut failures = 0;
        for (index1, index2) in self.pairs.by_ref().take(self.batch_size) {
            match self
                .scorer
                .score(&self.records[index1], &self.records[index2])
            {
                Ok(Some(similarity)) => {
                    self.stats.pairs_scored += 1;
                    if self.filter.accepts(similarity) {
                        self.matches.push(ScoredPair {
                            index1,
                            index2,
                            similarity,
                        });
                        matches += 1;
                    }
                }
                Ok(None) => self.stats.pairs_skipped += 1,
                Err(err) => {
                    tracing::warn!(
                        index1,
                        index2,
                        error = %err,
                        "Pair scoring failed, pair omitted"
                    );
                    self.stats.pairs_failed += 1;
                    failures += 1;
                }
            }
        }
        self.processed_batches += 1;
        self.stats.batches = self.processed_batches;
        let report = BatchReport {
            batch: self.processed_batches,
            total_batches: self.total_batches,
            progress: self.progress(),
            matches,
            failures,
        };
        tracing::debug!(
            batch = report.batch,
            total = report.total_batches,
            progress = report.progress,
            matches,
            failures,
            "Batch processed"
        );
        Some(report)
    }

    /// Consumes the runner, returning the accepted pairs in output order.
    pub fn finish(self) -> Scan {
        Scan {
            pairs: self.filter.apply(self.matches),
            stats: self.stats,
        }
    }

    ///
    /// Drives every batch, yielding to the async runtime between batches so other
    /// tasks (timers, I/O) get to run. Batches still execute strictly in order.
    ///
    pub async fn run<F>(
        mut self,
        cancel: Option<&CancelFlag>,
        mut on_progress: F,
    ) -> Result<Scan, DedupError>
    where
        F: FnMut(u8),
    {
        if self.total_batches == 0 {
            on_progress(100);
            return Ok(self.finish());
        }
        while !self.is_finished() {
            self.check_cancel(cancel)?;
            if let Some(report) = self.next_batch() {
                on_progress(report.progress);
            }
            if !self.is_finished() {
                tokio::task::yield_now().await;
            }
        }
        Ok(self.finish())
    }

    /// Same as [`run`](Self::run) without any suspension point.
    pub fn run_blocking<F>(
        mut self,
        cancel: Option<&CancelFlag>,
        mut on_progress: F,
    ) -> Result<Scan, DedupError>
    where
        F: FnMut(u8),
    {
        if self.total_batches == 0 {
            on_progress(100);
            return Ok(self.finish());
        }
        while !self.is_finished() {
            self.check_cancel(cancel)?;
            if let Some(report) = self.next_batch() {
                on_progress(report.progress);
            }
        }
        Ok(self.finish())
    }

    fn check_cancel(&self, cancel: Option<&CancelFlag>) -> Result<(), DedupError> {
        match cancel {
            Some(flag) if flag.is_cancelled() => {
                tracing::info!(
                    processed = self.processed_batches,
                    total = self.total_batches,
                    "Detection cancelled"
                );
                Err(DedupError::Cancelled {
                    processed: self.processed_batches,
                    total: self.total_batches,
                })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoreError;
    use std::cell::Cell;

    /// Scores by absolute difference of the stored numbers; negative inputs fail.
    struct NumberScorer {
        calls: Cell<usize>,
    }

    impl NumberScorer {
        fn new() -> Self {
            NumberScorer {
                calls: Cell::new(0),
            }
        }
    }

    impl PairScorer<i32> for NumberScorer {
        fn score(&self, a: &i32, b: &i32) -> Result<Option<u8>, ScoreError> {
            self.calls.set(self.calls.get() + 1);
            if *a < 0 || *b < 0 {
                return Err(ScoreError::Other("negative".to_string()));
            }
            if *a == 0 || *b == 0 {
                return Ok(None);
            }
            Ok(Some(100u8.saturating_sub((a - b).unsigned_abs() as u8)))
        }
    }

    fn filter(threshold: u8) -> ThresholdFilter {
        ThresholdFilter::new(threshold).unwrap()
    }

    #[test]
    fn batch_count_rounds_up() {
        let records: Vec<i32> = (1..=5).collect();
        let scorer = NumberScorer::new();
        let runner = BatchRunner::new(&records, &scorer, filter(0), Some(3)).unwrap();
        assert_eq!(runner.total_batches(), 4);
        assert_eq!(default_batch_size(10), DEFAULT_BATCH_SIZE);
        assert_eq!(default_batch_size(2_000_000), LARGE_RUN_BATCH_SIZE);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let records = vec![1, 2];
        let scorer = NumberScorer::new();
        assert!(matches!(
            BatchRunner::new(&records, &scorer, filter(0), Some(0)),
            Err(DedupError::InvalidInput(_))
        ));
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_100() {
        let records: Vec<i32> = (1..=12).collect();
        let scorer = NumberScorer::new();
        let runner = BatchRunner::new(&records, &scorer, filter(90), Some(7)).unwrap();
        let mut seen = Vec::new();
        let scan = runner.run_blocking(None, |p| seen.push(p)).unwrap();
        assert_eq!(seen.len(), 10);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100));
        assert_eq!(scan.stats.batches, 10);
        assert_eq!(scan.stats.pairs_scored, 66);
    }

    #[test]
    fn empty_run_reports_once_without_scoring() {
        let scorer = NumberScorer::new();
        for records in [vec![], vec![7]] {
            let runner = BatchRunner::new(&records, &scorer, filter(0), None).unwrap();
            let mut seen = Vec::new();
            let scan = runner.run_blocking(None, |p| seen.push(p)).unwrap();
            assert_eq!(seen, vec![100]);
            assert!(scan.pairs.is_empty());
        }
        assert_eq!(scorer.calls.get(), 0);
    }

    #[test]
    fn failing_pairs_are_isolated() {
        let records = vec![50, -1, 50, 0, 49];
        let scorer = NumberScorer::new();
        let runner = BatchRunner::new(&records, &scorer, filter(95), Some(2)).unwrap();
        let scan = runner.run_blocking(None, |_| {}).unwrap();
        assert_eq!(scan.stats.pairs_failed, 4);
        assert_eq!(scan.stats.pairs_skipped, 3);
        assert_eq!(scan.stats.pairs_scored, 3);
        let found: Vec<_> = scan.pairs.iter().map(|p| (p.index1, p.index2)).collect();
        assert_eq!(found, vec![(0, 2), (0, 4), (2, 4)]);
    }

    #[test]
    fn step_api_reports_each_batch() {
        let records = vec![10, 10, 10];
        let scorer = NumberScorer::new();
        let mut runner = BatchRunner::new(&records, &scorer, filter(100), Some(2)).unwrap();
        let first = runner.next_batch().unwrap();
        assert_eq!((first.batch, first.total_batches, first.progress), (1, 2, 50));
        assert_eq!(first.matches, 2);
        let second = runner.next_batch().unwrap();
        assert_eq!((second.batch, second.progress, second.matches), (2, 100, 1));
        assert!(runner.next_batch().is_none());
        assert_eq!(runner.finish().pairs.len(), 3);
    }

    #[test]
    fn cancellation_stops_at_batch_boundary() {
        let records: Vec<i32> = (1..=10).collect();
        let scorer = NumberScorer::new();
        let cancel = CancelFlag::new();
        let runner = BatchRunner::new(&records, &scorer, filter(0), Some(5)).unwrap();
        let trigger = cancel.clone();
        let result = runner.run_blocking(Some(&cancel), |p| {
            if p >= 20 {
                trigger.cancel();
            }
        });
        assert_eq!(
            result,
            Err(DedupError::Cancelled {
                processed: 2,
                total: 9
            })
        );
        assert_eq!(scorer.calls.get(), 10);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn spawned_task_runs_between_batches() {
        let records: Vec<i32> = (1..=10).collect();
        let scorer = NumberScorer::new();
        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        tokio::spawn(async move { trigger.cancel() });
        let result = BatchRunner::new(&records, &scorer, filter(0), Some(5))
            .unwrap()
            .run(Some(&cancel), |_| {})
            .await;
        assert_eq!(
            result,
            Err(DedupError::Cancelled {
                processed: 1,
                total: 9
            })
        );
        assert_eq!(scorer.calls.get(), 5);
    }

    #[test]
    fn blocking_run_ignores_pending_tasks() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let records: Vec<i32> = (1..=10).collect();
        let scorer = NumberScorer::new();
        let cancel = CancelFlag::new();
        let result = runtime.block_on(async {
            let trigger = cancel.clone();
            tokio::spawn(async move { trigger.cancel() });
            BatchRunner::new(&records, &scorer, filter(0), Some(5))
                .unwrap()
                .run_blocking(Some(&cancel), |_| {})
        });
        assert_eq!(result.unwrap().stats.batches, 9);
        assert_eq!(scorer.calls.get(), 45);
    }

    #[tokio::test]
    async fn async_run_matches_blocking_run() {
        let records: Vec<i32> = (1..=30).map(|n| n % 7 + 1).collect();
        let scorer = NumberScorer::new();
        let blocking = BatchRunner::new(&records, &scorer, filter(98), Some(11))
            .unwrap()
            .run_blocking(None, |_| {})
            .unwrap();
        let mut seen = Vec::new();
        let async_scan = BatchRunner::new(&records, &scorer, filter(98), Some(11))
            .unwrap()
            .run(None, |p| seen.push(p))
            .await
            .unwrap();
        assert_eq!(blocking, async_scan);
        assert_eq!(seen.last(), Some(&100));
    }
}
