//! Status callbacks to the control plane
//!
//! Two events are reported, each as a form-encoded POST to the job's callback URL
//! with `?Action=<event>` appended:
//!
//! - `FIRST_STATUS` once the archive is built (`uifn`, `uifnKey`, `size`, `dtime`)
//! - `SECOND_STATUS` once the archive has expired and been deleted (`uifn`)

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ReportConfig;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("callback request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("callback returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirstStatus {
    pub uifn: String,
    #[serde(rename = "uifnKey")]
    pub uifn_key: String,
    /// Human-readable decimal size, e.g. `1.5 kB`
    pub size: String,
    /// Seconds spent fetching
    pub dtime: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecondStatus {
    pub uifn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    First(FirstStatus),
    Second(SecondStatus),
}

impl ReportEvent {
    pub fn action(&self) -> &'static str {
        match self {
            ReportEvent::First(_) => "FIRST_STATUS",
            ReportEvent::Second(_) => "SECOND_STATUS",
        }
    }

    pub fn archive_name(&self) -> &str {
        match self {
            ReportEvent::First(s) => &s.uifn,
            ReportEvent::Second(s) => &s.uifn,
        }
    }
}

pub fn user_agent() -> String {
    format!("boardbox/v{}", env!("CARGO_PKG_VERSION"))
}

/// Delivers [`ReportEvent`]s; one attempt per call
#[derive(Clone)]
pub struct Reporter {
    client: Client,
}

impl Reporter {
    pub fn new(config: &ReportConfig) -> Result<Self, ReportError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(user_agent())
            .build()?;
        Ok(Self { client })
    }

    /// POST `event` to `callback_url`. Returns the response body on a 2xx.
    pub async fn send(&self, callback_url: &str, event: &ReportEvent) -> Result<String, ReportError> {
        let request = self
            .client
            .post(callback_url)
            .query(&[("Action", event.action())]);
        let request = match event {
            ReportEvent::First(status) => request.form(status),
            ReportEvent::Second(status) => request.form(status),
        };

        debug!(url = callback_url, action = event.action(), "Sending report");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ReportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            action = event.action(),
            archive = event.archive_name(),
            response = %body,
            "Report acknowledged"
        );
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(HashMap<String, String>, String, String)>>>;

    async fn start_callback_server(status: StatusCode) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route(
                "/callback",
                post(
                    move |State(seen): State<Seen>,
                          Query(query): Query<HashMap<String, String>>,
                          headers: HeaderMap,
                          body: String| async move {
                        let ua = headers
                            .get("user-agent")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        seen.lock().unwrap().push((query, body, ua));
                        (status, "received")
                    },
                ),
            )
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/callback"), seen)
    }

    #[test]
    fn test_actions() {
        let first = ReportEvent::First(FirstStatus {
            uifn: "hb_1.tar".into(),
            uifn_key: "k".into(),
            size: "1.5 kB".into(),
            dtime: 3,
        });
        let second = ReportEvent::Second(SecondStatus {
            uifn: "hb_1.tar".into(),
        });
        assert_eq!(first.action(), "FIRST_STATUS");
        assert_eq!(second.action(), "SECOND_STATUS");
        assert_eq!(second.archive_name(), "hb_1.tar");
    }

    #[tokio::test]
    async fn test_first_status_is_form_encoded() {
        let (url, seen) = start_callback_server(StatusCode::OK).await;
        let reporter = Reporter::new(&ReportConfig::default()).unwrap();

        let event = ReportEvent::First(FirstStatus {
            uifn: "hb_1700000000000.tar".into(),
            uifn_key: "abc".into(),
            size: "1.5 kB".into(),
            dtime: 7,
        });
        let body = reporter.send(&url, &event).await.unwrap();
        assert_eq!(body, "received");

        let seen = seen.lock().unwrap();
        let (query, form, ua) = &seen[0];
        assert_eq!(query.get("Action").map(String::as_str), Some("FIRST_STATUS"));
        let form: HashMap<String, String> = serde_urlencoded::from_str(form).unwrap();
        assert_eq!(form["uifn"], "hb_1700000000000.tar");
        assert_eq!(form["uifnKey"], "abc");
        assert_eq!(form["size"], "1.5 kB");
        assert_eq!(form["dtime"], "7");
        assert!(ua.starts_with("boardbox/v"));
    }

    #[tokio::test]
    async fn test_non_success_is_an_error() {
        let (url, _seen) = start_callback_server(StatusCode::INTERNAL_SERVER_ERROR).await;
        let reporter = Reporter::new(&ReportConfig::default()).unwrap();

        let event = ReportEvent::Second(SecondStatus {
            uifn: "hb_1.tar".into(),
        });
        let err = reporter.send(&url, &event).await.unwrap_err();
        assert!(matches!(err, ReportError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_callback_is_an_error() {
        let reporter = Reporter::new(&ReportConfig::default()).unwrap();
        let event = ReportEvent::Second(SecondStatus {
            uifn: "hb_1.tar".into(),
        });
        let err = reporter
            .send("http://127.0.0.1:9/callback", &event)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Request(_)));
    }
}
