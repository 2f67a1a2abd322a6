//! Fuzzy near-duplicate detection over tabular records.
//!
//! Every unordered pair of records is scored by approximate string matching
//! over one or two fields, in bounded batches. Pairs at or above a threshold
//! are reported, and a keep-first policy decides which records survive.
//!
//! ```
//! use fuzzy_dedup_service::{find_duplicates, resolve, Record};
//!
//! let records = vec![
//!     Record::new().with("Title", "Deep Learning in Healthcare"),
//!     Record::new().with("Title", "Deep Learning in Health Care"),
//!     Record::new().with("Title", "Unrelated Topic"),
//! ];
//! let pairs = find_duplicates(&records, ["Title"], 85).unwrap();
//! assert_eq!((pairs[0].index1, pairs[0].index2), (0, 1));
//! assert_eq!(resolve(&records, &pairs).len(), 2);
//! ```

pub mod batch;
pub mod detect;
pub mod dto;
pub mod error;
pub mod filter;
pub mod logging;
pub mod pairs;
pub mod record;
pub mod resolve;
pub mod response;
pub mod scorer;
pub mod util;

pub use batch::{BatchReport, BatchRunner, CancelFlag, RunStats};
pub use detect::{find_duplicates, DetectOptions, Detection, Detector};
pub use error::{DedupError, ScoreError, ServiceError};
pub use filter::{DuplicatePair, ThresholdFilter};
pub use pairs::PairIter;
pub use record::{Article, FieldLookup, Record};
pub use resolve::{resolve, DedupStats};
pub use scorer::{FuzzyScorer, KeySet, Matcher, PairScorer, ScorerConfig};
