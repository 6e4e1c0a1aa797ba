//! Observation points invoked around every call.
//!
//! # Design
//! Three optional collaborators are handed to the client at construction:
//! a `Logger` for the lifecycle trace, an `AnalyticsSink` that receives exactly
//! one `AnalyticsRecord` per call, and an `UnauthorizedHandler` notified on
//! every 401. They are shared across concurrent calls and the client does no
//! locking around them, so each implementation is responsible for its own
//! synchronisation.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::endpoint::Endpoint;
use crate::http::HttpMethod;

/// Lifecycle logger with four severities.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn debug(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
}

/// `Logger` that forwards to `tracing` under the `apiclient` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "apiclient", "{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "apiclient", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "apiclient", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "apiclient", "{message}");
    }
}

/// Per-call metrics emitted once the call has finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsRecord {
    pub endpoint: String,
    pub method: HttpMethod,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}

impl AnalyticsRecord {
    /// Wall-clock time between start and finish.
    pub fn duration(&self) -> TimeDelta {
        self.finished_at - self.started_at
    }
}

/// Receives one record per call, successful or not.
pub trait AnalyticsSink: Send + Sync {
    fn record(&self, record: AnalyticsRecord);
}

/// Notified synchronously whenever a call gets a 401, before the call returns.
pub trait UnauthorizedHandler: Send + Sync {
    fn on_unauthorized(&self, endpoint: &dyn Endpoint);
}

impl<F> UnauthorizedHandler for F
where
    F: Fn(&dyn Endpoint) + Send + Sync,
{
    fn on_unauthorized(&self, endpoint: &dyn Endpoint) {
        self(endpoint)
    }
}

impl<F> AnalyticsSink for F
where
    F: Fn(AnalyticsRecord) + Send + Sync,
{
    fn record(&self, record: AnalyticsRecord) {
        self(record)
    }
}

/// Log `bytes` as text at debug level. Bodies that are not UTF-8 are skipped.
pub(crate) fn log_body(logger: Option<&dyn Logger>, label: &str, bytes: &[u8]) {
    if let (Some(logger), Ok(text)) = (logger, std::str::from_utf8(bytes)) {
        logger.debug(&format!("{label}: {text}"));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;

    struct Login;

    impl Endpoint for Login {
        fn url(&self) -> String {
            "https://api.example.com/login".to_string()
        }

        fn identity(&self) -> String {
            "auth.login".to_string()
        }

        fn auth_headers(&self) -> Option<HashMap<String, String>> {
            Some(HashMap::new())
        }
    }

    #[test]
    fn closures_act_as_unauthorized_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = move |endpoint: &dyn Endpoint| sink.lock().unwrap().push(endpoint.identity());

        handler.on_unauthorized(&Login);
        assert_eq!(*seen.lock().unwrap(), vec!["auth.login".to_string()]);
    }

    #[test]
    fn record_duration_and_serialization() {
        let started_at = Utc::now();
        let record = AnalyticsRecord {
            endpoint: "auth.login".to_string(),
            method: HttpMethod::Post,
            started_at,
            finished_at: started_at + TimeDelta::milliseconds(250),
            success: false,
            status_code: Some(401),
            error_message: Some("server error 401 (request id N/A)".to_string()),
        };
        assert_eq!(record.duration(), TimeDelta::milliseconds(250));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["method"], "POST");
        assert_eq!(json["status_code"], 401);
    }

    #[test]
    fn closures_act_as_analytics_sinks() {
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        let sink = move |_record: AnalyticsRecord| *counter.lock().unwrap() += 1;
        let now = Utc::now();
        sink.record(AnalyticsRecord {
            endpoint: "x".to_string(),
            method: HttpMethod::Get,
            started_at: now,
            finished_at: now,
            success: true,
            status_code: Some(200),
            error_message: None,
        });
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn tracing_logger_accepts_every_severity() {
        let logger = TracingLogger;
        logger.info("info");
        logger.debug("debug");
        logger.warn("warn");
        logger.error("error");
    }
}
