use csv::{Reader, Writer};
use fuzzy_dedup_service::dto::DataFile;
use fuzzy_dedup_service::error::ServiceError;
use fuzzy_dedup_service::util::{download_object_from_s3, upload_object_to_s3};
use fuzzy_dedup_service::{Article, DuplicatePair, FieldLookup, KeySet, Record};
use rusoto_s3::S3Client;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// A parsed input file: its header row and one record per data row.
pub struct CsvTable {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutputFiles {
    pub duplicates: DataFile,
    pub deduplicated: DataFile,
}

pub async fn pull_data_file(client: &S3Client, data: &DataFile) -> Result<CsvTable, ServiceError> {
    let bytes = download_object_from_s3(client, data.bucket.clone(), data.key.clone()).await?;
    parse_csv(bytes.as_slice())
}

///
/// Reads a CSV with a header row. Empty cells are left out of the record so
/// they read as absent fields.
///
pub fn parse_csv(bytes: &[u8]) -> Result<CsvTable, ServiceError> {
    let mut reader = Reader::from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| ServiceError::bad_request(format!("Unable to read CSV header: {}", err)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    check_headers(&headers)?;
    let records = reader
        .records()
        .map(|row| match row {
            Ok(row) => Ok(headers
                .iter()
                .zip(row.iter())
                .filter(|(_, value)| !value.is_empty())
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect::<Record>()),
            Err(err) => Err(ServiceError::bad_request(format!("Malformed CSV: {}", err))),
        })
        .collect::<Result<Vec<Record>, ServiceError>>()?;
    Ok(CsvTable { headers, records })
}

/// Every column needs a distinct, non-empty name for rows to be written back intact.
fn check_headers(headers: &[String]) -> Result<(), ServiceError> {
    if let Some(pos) = headers.iter().position(|h| h.is_empty()) {
        return Err(ServiceError::bad_request(format!(
            "CSV header column {} has no name",
            pos + 1
        )));
    }
    let mut seen = FxHashSet::default();
    if let Some(dup) = headers.iter().find(|h| !seen.insert(h.as_str())) {
        return Err(ServiceError::bad_request(format!(
            "CSV header column '{}' appears more than once",
            dup
        )));
    }
    Ok(())
}

///
/// Fails when a comparison field is not a column of the file.
///
pub fn check_columns(keys: &KeySet, headers: &[String]) -> Result<(), ServiceError> {
    match keys.names().iter().find(|k| !headers.contains(*k)) {
        Some(missing) => Err(ServiceError::bad_request(format!(
            "CSV has no column '{}'",
            missing
        ))),
        None => Ok(()),
    }
}

///
/// Converts a table to articles. The header must name both `Title` and `Doi`;
/// rows missing either value are dropped.
///
pub fn to_articles(records: Vec<Record>, headers: &[String]) -> Result<Vec<Article>, ServiceError> {
    let has = |name: &str| headers.iter().any(|h| h == name);
    if !has(Article::TITLE) || !has(Article::DOI) {
        return Err(ServiceError::bad_request(
            "CSV must include 'Title' and 'Doi' columns",
        ));
    }
    let total = records.len();
    let articles: Vec<Article> = records.into_iter().filter_map(Article::from_record).collect();
    if articles.len() < total {
        tracing::info!(
            dropped = total - articles.len(),
            "Rows without a Title or Doi were dropped"
        );
    }
    Ok(articles)
}

/// Output locations: the input bucket with `/input` swapped for `/output`.
pub fn output_files(data: &DataFile) -> OutputFiles {
    let bucket = data.bucket.replace("/input", "/output");
    let stem = data.key.strip_suffix(".csv").unwrap_or(&data.key);
    OutputFiles {
        duplicates: DataFile {
            bucket: bucket.clone(),
            key: format!("{}.duplicates.csv", stem),
        },
        deduplicated: DataFile {
            bucket,
            key: format!("{}.deduplicated.csv", stem),
        },
    }
}

pub fn write_duplicates_csv<R: FieldLookup>(
    keys: &KeySet,
    pairs: &[DuplicatePair<R>],
) -> Result<Vec<u8>, ServiceError> {
    let mut writer = Writer::from_writer(vec![]);
    writer
        .write_record(["index1", "index2", "similarity", "record1", "record2"])
        .map_err(ServiceError::internal_server_error)?;
    for pair in pairs {
        writer
            .write_record([
                pair.index1.to_string(),
                pair.index2.to_string(),
                pair.similarity.to_string(),
                keys.comparison_string(&pair.record1).unwrap_or_default(),
                keys.comparison_string(&pair.record2).unwrap_or_default(),
            ])
            .map_err(ServiceError::internal_server_error)?;
    }
    writer
        .into_inner()
        .map_err(ServiceError::internal_server_error)
}

/// Writes `records` under the given header row; absent fields become empty cells.
pub fn write_records_csv<R: FieldLookup>(
    headers: &[String],
    records: &[R],
) -> Result<Vec<u8>, ServiceError> {
    let mut writer = Writer::from_writer(vec![]);
    writer
        .write_record(headers)
        .map_err(ServiceError::internal_server_error)?;
    for record in records {
        writer
            .write_record(headers.iter().map(|h| record.field(h).unwrap_or("")))
            .map_err(ServiceError::internal_server_error)?;
    }
    writer
        .into_inner()
        .map_err(ServiceError::internal_server_error)
}

pub async fn push_result_files<R: FieldLookup>(
    client: &S3Client,
    data: &DataFile,
    keys: &KeySet,
    headers: &[String],
    pairs: &[DuplicatePair<R>],
    survivors: &[R],
) -> Result<OutputFiles, ServiceError> {
    let outputs = output_files(data);
    let duplicates = write_duplicates_csv(keys, pairs)?;
    let deduplicated = write_records_csv(headers, survivors)?;
    upload_object_to_s3(
        client,
        duplicates,
        outputs.duplicates.bucket.clone(),
        outputs.duplicates.key.clone(),
        CSV_CONTENT_TYPE,
    )
    .await?;
    upload_object_to_s3(
        client,
        deduplicated,
        outputs.deduplicated.bucket.clone(),
        outputs.deduplicated.key.clone(),
        CSV_CONTENT_TYPE,
    )
    .await?;
    Ok(outputs)
}

///
/// Keeps at most `max` pairs per `index1`, preserving order, so the response
/// body stays within payload limits. The full list still goes to S3.
///
pub fn cap_matches_per_record<R: Clone>(
    pairs: &[DuplicatePair<R>],
    max: Option<usize>,
) -> Vec<DuplicatePair<R>> {
    let max = match max {
        Some(max) => max,
        None => return pairs.to_vec(),
    };
    let mut counts: FxHashMap<usize, usize> = FxHashMap::default();
    pairs
        .iter()
        .filter(|pair| {
            let count = counts.entry(pair.index1).or_insert(0);
            *count += 1;
            *count <= max
        })
        .cloned()
        .collect()
}

///
/// Logs detection progress each time it crosses another tenth.
///
#[derive(Default)]
pub struct ProgressLog {
    last_step: Option<u8>,
}

impl ProgressLog {
    pub fn report(&mut self, progress: u8) {
        let step = progress / 10;
        if self.last_step.map_or(true, |last| step > last) {
            self.last_step = Some(step);
            tracing::info!(progress, "Detection progress");
        }
    }
}
