//! Capability probe: picks a transport for a feed URL.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::info;

use crate::sse::{is_event_stream, EVENT_STREAM_MIME};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Sse,
    Polling,
}

/// Open the feed once and look at the response content type.
///
/// Only a successful response that is not `text/event-stream` selects
/// polling. An unreachable feed, a timeout or an error status selects SSE,
/// whose failures reach the supervisor and drive reconnects.
pub async fn probe_transport(client: &reqwest::Client, url: &str, timeout: Duration) -> TransportKind {
    let request = client.get(url).header(ACCEPT, EVENT_STREAM_MIME).send();
    let (kind, reason) = match tokio::time::timeout(timeout, request).await {
        Ok(Ok(response)) if response.status().is_success() => {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();
            if is_event_stream(content_type) {
                (TransportKind::Sse, "event_stream".to_string())
            } else {
                (TransportKind::Polling, format!("content_type={content_type}"))
            }
        }
        Ok(Ok(response)) => (TransportKind::Sse, format!("status={}", response.status().as_u16())),
        Ok(Err(err)) => (TransportKind::Sse, format!("error={err}")),
        Err(_) => (TransportKind::Sse, "timeout".to_string()),
    };

    info!(
        component = "probe",
        event = "probe.selected",
        url = %url,
        transport = ?kind,
        reason = %reason,
    );
    kind
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    use axum::response::sse::{Event, Sse};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn event_stream_selects_sse() {
        let base = serve(Router::new().route(
            "/feed",
            get(|| async {
                Sse::new(futures::stream::pending::<Result<Event, Infallible>>())
            }),
        ))
        .await;

        let kind = probe_transport(&reqwest::Client::new(), &format!("{base}/feed"), DEFAULT_PROBE_TIMEOUT).await;
        assert_eq!(kind, TransportKind::Sse);
    }

    #[tokio::test]
    async fn json_endpoint_selects_polling() {
        let base = serve(Router::new().route("/feed", get(|| async { Json(json!([])) }))).await;

        let kind = probe_transport(&reqwest::Client::new(), &format!("{base}/feed"), DEFAULT_PROBE_TIMEOUT).await;
        assert_eq!(kind, TransportKind::Polling);
    }

    #[tokio::test]
    async fn unreachable_endpoint_selects_sse() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let kind = probe_transport(
            &reqwest::Client::new(),
            &format!("http://{addr}/feed"),
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(kind, TransportKind::Sse);
    }

    #[tokio::test]
    async fn error_status_selects_sse() {
        let base = serve(Router::new().route(
            "/feed",
            get(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
        ))
        .await;

        let kind = probe_transport(&reqwest::Client::new(), &format!("{base}/feed"), DEFAULT_PROBE_TIMEOUT).await;
        assert_eq!(kind, TransportKind::Sse);
    }

    #[tokio::test]
    async fn slow_feed_selects_sse() {
        let base = serve(Router::new().route(
            "/feed",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Json(json!([]))
            }),
        ))
        .await;

        let kind = probe_transport(
            &reqwest::Client::new(),
            &format!("{base}/feed"),
            Duration::from_millis(100),
        )
        .await;
        assert_eq!(kind, TransportKind::Sse);
    }
}
