//! Record writer: pushes an update to the feed's backing record API.
//!
//! The change is not applied locally; it shows up through the subscription.

use serde_json::Value;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RecordWriteError {
    #[error("Record body must be a JSON object")]
    NotAnObject,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Record API rejected update ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// PATCH `url` with `body`. Succeeds only on a 2xx response.
pub async fn patch_record(
    client: &reqwest::Client,
    url: &str,
    body: &Value,
) -> Result<(), RecordWriteError> {
    if !body.is_object() {
        return Err(RecordWriteError::NotAnObject);
    }

    let response = client.patch(url).json(body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RecordWriteError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    info!(
        component = "record_writer",
        event = "record_writer.patched",
        url = %url,
        status = status.as_u16(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::patch;
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
    async fn patch_sends_json_body() {
        let app = Router::new().route(
            "/people/2",
            patch(|Json(body): Json<Value>| async move {
                if body["name"] == "Bob" {
                    StatusCode::OK
                } else {
                    StatusCode::BAD_REQUEST
                }
            }),
        );
        let base = serve(app).await;

        patch_record(
            &reqwest::Client::new(),
            &format!("{base}/people/2"),
            &json!({"name": "Bob", "age": 30}),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn rejected_update_reports_status_and_body() {
        let app = Router::new().route(
            "/people/2",
            patch(|| async { (StatusCode::FORBIDDEN, "read only") }),
        );
        let base = serve(app).await;

        let err = patch_record(
            &reqwest::Client::new(),
            &format!("{base}/people/2"),
            &json!({"age": 1}),
        )
        .await
        .unwrap_err();
        match err {
            RecordWriteError::Rejected { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "read only");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_object_body_is_refused() {
        let err = patch_record(&reqwest::Client::new(), "http://127.0.0.1:1/x", &json!([1]))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordWriteError::NotAnObject));
    }
}
