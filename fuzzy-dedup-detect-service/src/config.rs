use fuzzy_dedup_service::error::ServiceError;
use fuzzy_dedup_service::util::{get_env_parsed, get_region};
use rusoto_core::Region;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Records accepted per request unless `MAX_RECORDS` says otherwise.
pub const DEFAULT_MAX_RECORDS: usize = 5_000;
/// Time kept in reserve before the invocation deadline for writing results.
pub const DEFAULT_DEADLINE_MARGIN_MS: u64 = 2_000;

#[derive(Clone, Debug)]
pub struct Settings {
    pub region: Region,
    pub max_records: usize,
    pub deadline_margin: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ServiceError> {
        Ok(Settings {
            region: get_region()?,
            max_records: get_env_parsed("MAX_RECORDS", DEFAULT_MAX_RECORDS)?,
            deadline_margin: Duration::from_millis(get_env_parsed(
                "DEADLINE_MARGIN_MS",
                DEFAULT_DEADLINE_MARGIN_MS,
            )?),
        })
    }

    pub fn check_record_count(&self, count: usize) -> Result<(), ServiceError> {
        if count > self.max_records {
            return Err(ServiceError::bad_request(format!(
                "File contains {} records, the limit is {}",
                count, self.max_records
            )));
        }
        Ok(())
    }

    ///
    /// Time the detection may run before it must be cancelled, given the
    /// invocation deadline in epoch milliseconds. `None` when no deadline is set.
    ///
    pub fn budget(&self, deadline_ms: u64) -> Option<Duration> {
        if deadline_ms == 0 {
            return None;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let remaining = Duration::from_millis(deadline_ms.saturating_sub(now));
        Some(remaining.saturating_sub(self.deadline_margin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            region: Region::UsEast1,
            max_records: 3,
            deadline_margin: Duration::from_millis(2_000),
        }
    }

    #[test]
    fn record_cap_is_inclusive() {
        assert!(settings().check_record_count(3).is_ok());
        assert!(settings().check_record_count(4).is_err());
    }

    #[test]
    fn budget_reserves_margin() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        let budget = settings().budget(now + 10_000).unwrap();
        assert!(budget <= Duration::from_millis(8_000));
        assert!(budget > Duration::from_millis(7_000));
        assert_eq!(settings().budget(now), Some(Duration::ZERO));
        assert_eq!(settings().budget(0), None);
    }
}
