use crate::batch::{BatchRunner, CancelFlag, RunStats, Scan};
use crate::error::DedupError;
use crate::filter::{materialize, DuplicatePair, ThresholdFilter};
use crate::record::FieldLookup;
use crate::scorer::{FuzzyScorer, KeySet, ScorerConfig};
use std::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectOptions {
    /// One or two field names to compare.
    pub keys: Vec<String>,
    /// Minimum similarity (0-100, inclusive) for a pair to count as a duplicate.
    pub threshold: u8,
    /// Pairs per batch; sized from the pair count when unset.
    pub batch_size: Option<usize>,
    pub scorer: ScorerConfig,
}

impl DetectOptions {
    pub fn new<I, S>(keys: I, threshold: u8) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DetectOptions {
            keys: keys.into_iter().map(Into::into).collect(),
            threshold,
            batch_size: None,
            scorer: ScorerConfig::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_scorer(mut self, scorer: ScorerConfig) -> Self {
        self.scorer = scorer;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Detection<R> {
    pub pairs: Vec<DuplicatePair<R>>,
    pub stats: RunStats,
}

///
/// Validated configuration for detection runs. Construction fails on bad input
/// or an unusable scorer configuration; after that a run can only fail by
/// being cancelled.
///
pub struct Detector {
    scorer: FuzzyScorer,
    filter: ThresholdFilter,
    batch_size: Option<usize>,
}

impl Detector {
    pub fn new(options: &DetectOptions) -> Result<Self, DedupError> {
        let keys = KeySet::new(options.keys.iter().cloned())?;
        let filter = ThresholdFilter::new(options.threshold)?;
        if options.batch_size == Some(0) {
            return Err(DedupError::InvalidInput(
                "batch size must be positive".to_string(),
            ));
        }
        let scorer = FuzzyScorer::new(keys, &options.scorer)?;
        Ok(Detector {
            scorer,
            filter,
            batch_size: options.batch_size,
        })
    }

    pub fn scorer(&self) -> &FuzzyScorer {
        &self.scorer
    }

    pub fn threshold(&self) -> u8 {
        self.filter.threshold()
    }

    /// A fresh runner over `records`, for callers that schedule batches themselves.
    pub fn runner<'a, R: FieldLookup>(
        &'a self,
        records: &'a [R],
    ) -> Result<BatchRunner<'a, R, FuzzyScorer>, DedupError> {
        BatchRunner::new(records, &self.scorer, self.filter, self.batch_size)
    }

    pub async fn detect<R, F>(
        &self,
        records: &[R],
        cancel: Option<&CancelFlag>,
        on_progress: F,
    ) -> Result<Detection<R>, DedupError>
    where
        R: FieldLookup + Clone,
        F: FnMut(u8),
    {
        let start = Instant::now();
        let scan = self.runner(records)?.run(cancel, on_progress).await?;
        Ok(self.complete(records, scan, start))
    }

    pub fn detect_blocking<R, F>(
        &self,
        records: &[R],
        cancel: Option<&CancelFlag>,
        on_progress: F,
    ) -> Result<Detection<R>, DedupError>
    where
        R: FieldLookup + Clone,
        F: FnMut(u8),
    {
        let start = Instant::now();
        let scan = self.runner(records)?.run_blocking(cancel, on_progress)?;
        Ok(self.complete(records, scan, start))
    }

    fn complete<R: Clone>(&self, records: &[R], scan: Scan, start: Instant) -> Detection<R> {
        tracing::info!(
            records = records.len(),
            duplicates = scan.pairs.len(),
            scored = scan.stats.pairs_scored,
            skipped = scan.stats.pairs_skipped,
            failed = scan.stats.pairs_failed,
            threshold = self.filter.threshold(),
            secs = start.elapsed().as_secs_f64(),
            "Detection completed"
        );
        Detection {
            pairs: materialize(records, &scan.pairs),
            stats: scan.stats,
        }
    }
}

///
/// One-shot blocking detection with the default scorer and batch sizing.
///
pub fn find_duplicates<R, I, S>(
    records: &[R],
    keys: I,
    threshold: u8,
) -> Result<Vec<DuplicatePair<R>>, DedupError>
where
    R: FieldLookup + Clone,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let detector = Detector::new(&DetectOptions::new(keys, threshold))?;
    detector
        .detect_blocking(records, None, |_| {})
        .map(|d| d.pairs)
}
