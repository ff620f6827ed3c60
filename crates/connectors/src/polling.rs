//! Polling fallback transport
//!
//! For endpoints that cannot hold a stream open. Reports `Open` immediately,
//! then GETs the poll URL on a fixed interval and wraps each JSON body in a
//! `poll_update` frame. Each poll is bounded by the interval. A failed poll
//! is logged and the loop keeps going until too many fail in a row, then the
//! transport reports an error and stops.

use std::time::Duration;

use livesync_connector_core::{EventSink, Transport, TransportError};
use livesync_protocol::now_ms;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Consecutive failed polls before the transport gives up.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Clone)]
pub struct PollingTransport {
    client: reqwest::Client,
    interval: Duration,
    poll_url: Option<String>,
}

impl PollingTransport {
    /// `poll_url` overrides the URL passed to `spawn` when set.
    pub fn new(client: reqwest::Client, interval: Duration, poll_url: Option<String>) -> Self {
        Self {
            client,
            interval,
            poll_url,
        }
    }
}

impl Transport for PollingTransport {
    fn name(&self) -> &'static str {
        "polling"
    }

    fn spawn(&self, url: &str, sink: EventSink) -> JoinHandle<()> {
        let client = self.client.clone();
        let interval = self.interval;
        let url = self.poll_url.clone().unwrap_or_else(|| url.to_string());

        tokio::spawn(async move {
            if !sink.open() {
                return;
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut poll_number: u64 = 0;
            let mut failures: u32 = 0;
            loop {
                ticker.tick().await;
                poll_number += 1;

                match poll_once(&client, &url, interval).await {
                    Ok(body) => {
                        failures = 0;
                        let frame = poll_update_frame(body, poll_number, now_ms());
                        if !sink.message(frame) {
                            return;
                        }
                    }
                    Err(err) => {
                        failures += 1;
                        warn!(
                            component = "polling_transport",
                            event = "polling.poll_failed",
                            attempt = sink.attempt(),
                            poll_number,
                            failures,
                            error = %err,
                            "Poll failed"
                        );
                        if failures >= MAX_CONSECUTIVE_FAILURES {
                            sink.error(err);
                            return;
                        }
                    }
                }
            }
        })
    }
}

/// One GET, body included, bounded by `timeout`.
async fn poll_once(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Value, TransportError> {
    let request = async {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))
    };
    let body = tokio::time::timeout(timeout, request)
        .await
        .map_err(|_| TransportError::Request(format!("poll timed out after {timeout:?}")))??;
    debug!(
        component = "polling_transport",
        event = "polling.poll_ok",
        url = %url,
    );
    Ok(body)
}

fn poll_update_frame(data: Value, poll_number: u64, poll_time: i64) -> String {
    json!({
        "type": "poll_update",
        "data": data,
        "poll_time": poll_time,
        "poll_number": poll_number,
    })
    .to_string()
}
