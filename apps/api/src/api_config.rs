use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use rolereaper_application::ReviewConcurrency;
use rolereaper_core::AppError;

use crate::review_worker::ReviewWorkerSettings;

/// Runtime configuration read from the process environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_host: String,
    pub api_port: u16,
    pub directory_snapshot_path: PathBuf,
    pub concurrency: ReviewConcurrency,
    pub poll_interval: Duration,
    pub job_retention: TimeDelta,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let api_host = lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = match lookup("API_PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|error| AppError::Validation(format!("invalid API_PORT: {error}")))?,
            None => 3001,
        };

        let directory_snapshot_path =
            PathBuf::from(required_non_empty(&lookup, "DIRECTORY_SNAPSHOT_PATH")?);

        let concurrency = ReviewConcurrency::new(
            positive_count(&lookup, "REVIEW_MAX_CONCURRENT_JOBS", 2)?,
            positive_count(&lookup, "REVIEW_MAX_CONCURRENT_USERS", 4)?,
            positive_count(&lookup, "REVIEW_MAX_CONCURRENT_ACTIVITIES", 8)?,
        )?;

        let poll_interval = Duration::from_millis(positive_number(
            &lookup,
            "REVIEW_POLL_INTERVAL_MS",
            1000,
        )?);

        let retention_seconds = positive_number(&lookup, "REVIEW_JOB_RETENTION_SECONDS", 3600)?;
        let job_retention = i64::try_from(retention_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "REVIEW_JOB_RETENTION_SECONDS is out of range: {retention_seconds}"
                ))
            })?;

        Ok(Self {
            api_host,
            api_port,
            directory_snapshot_path,
            concurrency,
            poll_interval,
            job_retention,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }

    pub fn worker_settings(&self) -> ReviewWorkerSettings {
        ReviewWorkerSettings {
            poll_interval: self.poll_interval,
            job_retention: self.job_retention,
        }
    }
}

fn required_non_empty(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<String, AppError> {
    let value = lookup(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn positive_number(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<u64, AppError> {
    let Some(value) = lookup(name) else {
        return Ok(default);
    };

    let parsed = value
        .trim()
        .parse::<u64>()
        .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))?;
    if parsed == 0 {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(parsed)
}

fn positive_count(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: usize,
) -> Result<usize, AppError> {
    let default = u64::try_from(default).unwrap_or(u64::MAX);
    let value = positive_number(lookup, name, default)?;
    usize::try_from(value)
        .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))
}
