mod config;
mod util;

use config::Settings;
use fuzzy_dedup_service::dto::{DetectConfig, DetectMode};
use fuzzy_dedup_service::error::ServiceError;
use fuzzy_dedup_service::logging;
use fuzzy_dedup_service::response::make_response_payload;
use fuzzy_dedup_service::{resolve, CancelFlag, DedupStats, Detector, FieldLookup};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use rusoto_core::Client;
use rusoto_s3::S3Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    logging::init();
    let settings = Settings::from_env()?;
    run(service_fn(move |event| {
        let settings = settings.clone();
        async move { process(event, &settings).await }
    }))
    .await?;
    Ok(())
}

async fn process(event: LambdaEvent<DetectConfig>, settings: &Settings) -> Result<Value, Error> {
    let (config, context) = event.into_parts();
    tracing::info!(request_id = %context.request_id, "Detection requested");
    let cancel = CancelFlag::new();
    let watchdog = settings
        .budget(context.deadline)
        .map(|budget| tokio::spawn(cancel_after(budget, cancel.clone())));
    let result = detect(config, settings, &cancel).await;
    if let Some(handle) = watchdog {
        handle.abort();
    }
    make_response_payload(result)
}

async fn cancel_after(budget: Duration, cancel: CancelFlag) {
    tokio::time::sleep(budget).await;
    tracing::warn!(budget_ms = budget.as_millis() as u64, "Deadline reached, cancelling detection");
    cancel.cancel();
}

async fn detect(
    config: DetectConfig,
    settings: &Settings,
    cancel: &CancelFlag,
) -> Result<Value, ServiceError> {
    let start = std::time::Instant::now();
    let detector = Detector::new(&config.detect_options()?)?;
    let client = S3Client::new_with_client(Client::shared(), settings.region.clone());
    let table = util::pull_data_file(&client, &config.data).await?;
    tracing::info!(
        records = table.records.len(),
        secs = start.elapsed().as_secs_f64(),
        "File downloaded"
    );
    settings.check_record_count(table.records.len())?;
    match config.mode {
        DetectMode::General => {
            util::check_columns(detector.scorer().keys(), &table.headers)?;
            run_detection(&client, &config, &detector, &table.headers, table.records, cancel).await
        }
        DetectMode::Articles => {
            let articles = util::to_articles(table.records, &table.headers)?;
            run_detection(&client, &config, &detector, &table.headers, articles, cancel).await
        }
    }
}

async fn run_detection<R>(
    client: &S3Client,
    config: &DetectConfig,
    detector: &Detector,
    headers: &[String],
    records: Vec<R>,
    cancel: &CancelFlag,
) -> Result<Value, ServiceError>
where
    R: FieldLookup + Clone + Serialize + Send + Sync,
{
    let mut progress = util::ProgressLog::default();
    let detection = detector
        .detect(&records, Some(cancel), |p| progress.report(p))
        .await?;
    let stats = DedupStats::new(records.len(), &detection.pairs);
    let survivors = resolve(&records, &detection.pairs);
    let outputs = util::push_result_files(
        client,
        &config.data,
        detector.scorer().keys(),
        headers,
        &detection.pairs,
        &survivors,
    )
    .await?;
    let matches = util::cap_matches_per_record(&detection.pairs, config.max_matches_per_record);
    tracing::info!(
        duplicates = stats.duplicate_pairs,
        removed = stats.removed_records,
        clean = stats.clean_records,
        "Results written"
    );
    Ok(json!({
        "duplicates": outputs.duplicates,
        "deduplicated": outputs.deduplicated,
        "stats": stats,
        "run": detection.stats,
        "matches": matches,
    }))
}
