use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::{backoff_linear, discard_status, RetryPolicy};

/// Plain retry settings, suitable for embedding in application config.
///
/// Converts into a [`RetryPolicy`] with the default decider.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Maximum number of attempts, including the first one.
    pub max_retry: u32,
    /// Linear back-off step in milliseconds.
    pub backoff_ms: u64,
    /// Response statuses that trigger another attempt.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retry: 3,
            backoff_ms: 100,
            retry_statuses: Vec::new(),
        }
    }
}

impl RetryOptions {
    /// Reads options from environment variables.
    ///
    /// Reads:
    /// - `HTTP_RETRY_MAX`: maximum attempts
    /// - `HTTP_RETRY_BACKOFF_MS`: linear back-off step
    /// - `HTTP_RETRY_STATUSES`: comma separated status codes to retry on
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut options = Self::default();

        if let Some(value) = lookup("HTTP_RETRY_MAX") {
            options.max_retry = value
                .trim()
                .parse()
                .map_err(|err| format!("invalid HTTP_RETRY_MAX '{value}': {err}"))?;
        }
        if let Some(value) = lookup("HTTP_RETRY_BACKOFF_MS") {
            options.backoff_ms = value
                .trim()
                .parse()
                .map_err(|err| format!("invalid HTTP_RETRY_BACKOFF_MS '{value}': {err}"))?;
        }
        if let Some(value) = lookup("HTTP_RETRY_STATUSES") {
            options.retry_statuses = value
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(|code| {
                    code.parse::<u16>()
                        .map_err(|err| format!("invalid HTTP_RETRY_STATUSES entry '{code}': {err}"))
                })
                .collect::<Result<_, _>>()?;
        }

        Ok(options)
    }
}

impl From<RetryOptions> for RetryPolicy {
    fn from(options: RetryOptions) -> Self {
        let policy = RetryPolicy::default()
            .with_max_retry(options.max_retry)
            .with_backoff(backoff_linear(Duration::from_millis(options.backoff_ms)));

        let statuses: Vec<StatusCode> = options
            .retry_statuses
            .into_iter()
            .filter_map(|code| StatusCode::from_u16(code).ok())
            .collect();
        if statuses.is_empty() {
            policy
        } else {
            policy.with_discarder(discard_status(statuses))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use super::RetryOptions;
    use crate::RetryPolicy;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_policy_defaults() {
        let options = RetryOptions::default();
        assert_eq!(options.max_retry, 3);
        assert_eq!(options.backoff_ms, 100);

        let policy = RetryPolicy::from(options);
        assert_eq!(policy.max_retry(), 3);
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
    }

    #[test]
    fn env_overrides_defaults() {
        let options = RetryOptions::from_lookup(lookup(&[
            ("HTTP_RETRY_MAX", "5"),
            ("HTTP_RETRY_BACKOFF_MS", " 25 "),
            ("HTTP_RETRY_STATUSES", "503, 429,"),
        ]))
        .expect("options must parse");

        assert_eq!(
            options,
            RetryOptions {
                max_retry: 5,
                backoff_ms: 25,
                retry_statuses: vec![503, 429],
            }
        );
    }

    #[test]
    fn env_rejects_garbage() {
        let err = RetryOptions::from_lookup(lookup(&[("HTTP_RETRY_MAX", "many")]))
            .expect_err("must reject non-numeric value");
        assert!(err.contains("HTTP_RETRY_MAX"));
    }

    #[test]
    fn deserializes_partial_config() {
        let options: RetryOptions =
            serde_json::from_str(r#"{"retry_statuses":[502]}"#).expect("config must parse");
        assert_eq!(options.max_retry, 3);
        assert_eq!(options.retry_statuses, vec![502]);
    }

    #[test]
    fn retry_statuses_become_discarder() {
        let policy = RetryPolicy::from(RetryOptions {
            retry_statuses: vec![502],
            ..RetryOptions::default()
        });
        let bad_gateway = reqwest::Response::from(
            http::Response::builder()
                .status(502)
                .body("")
                .expect("response must build"),
        );
        assert!(policy.should_discard(&bad_gateway));
    }
}
