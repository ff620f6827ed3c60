//! Payload classifier
//!
//! Decides whether a raw frame is structured data or protocol noise.
//! Total over all input: every string yields a classification.

use livesync_protocol::{now_ms, Classified, NoiseKind, StreamRecord};
use serde_json::Value;

/// Classify a frame, stamping structured records with the current time.
pub fn classify(text: &str) -> Classified {
    classify_at(text, now_ms())
}

/// Classify a frame with an explicit arrival timestamp.
pub fn classify_at(text: &str, timestamp: i64) -> Classified {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if let Some(record) = StreamRecord::from_value(value, timestamp) {
            return Classified::Structured(record);
        }
    }
    Classified::Noise(noise_kind(text))
}

/// Ordered heuristics for frames that did not decode as an object or array.
pub fn noise_kind(text: &str) -> NoiseKind {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return NoiseKind::Empty;
    }

    if text.starts_with("data:") {
        return NoiseKind::SseData;
    }
    if text.starts_with("event:") {
        return NoiseKind::SseEvent;
    }
    if text.starts_with("id:") {
        return NoiseKind::SseId;
    }
    if text.starts_with("retry:") {
        return NoiseKind::SseRetry;
    }
    if trimmed == ":" {
        return NoiseKind::Heartbeat;
    }
    if text.starts_with(':') {
        return NoiseKind::Comment;
    }

    let lower = text.to_lowercase();
    if lower.starts_with("<!doctype") || lower.starts_with("<html") {
        return NoiseKind::HtmlPage;
    }
    if text.starts_with('<') {
        return NoiseKind::MarkupFragment;
    }
    if lower.contains("error") {
        return NoiseKind::ErrorMessage;
    }
    if lower.contains("connect") {
        return NoiseKind::ConnectionMessage;
    }
    if text.chars().all(|c| c.is_ascii_digit()) {
        return NoiseKind::Numeric;
    }

    NoiseKind::PlainText
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn noise(text: &str) -> NoiseKind {
        match classify_at(text, 0) {
            Classified::Noise(kind) => kind,
            Classified::Structured(record) => panic!("expected noise, got {record:?}"),
        }
    }

    #[test]
    fn object_becomes_record_with_timestamp() {
        let Classified::Structured(record) = classify(r#"{"a":1}"#) else {
            panic!("expected structured");
        };
        assert_eq!(record.get("a"), Some(&json!(1)));
        assert!(record.timestamp() > 0);
        assert!(record.to_json()["timestamp"].is_i64());
    }

    #[test]
    fn array_becomes_record() {
        assert!(matches!(
            classify_at(r#"[{"id":1},{"id":2}]"#, 5),
            Classified::Structured(_)
        ));
    }

    #[test]
    fn bare_colon_is_heartbeat() {
        assert_eq!(noise(":"), NoiseKind::Heartbeat);
        assert_eq!(noise(" : "), NoiseKind::Heartbeat);
    }

    #[test]
    fn empty_and_whitespace() {
        assert_eq!(noise(""), NoiseKind::Empty);
        assert_eq!(noise(" \t\r\n"), NoiseKind::Empty);
    }

    #[test]
    fn html_documents() {
        assert_eq!(noise("<html>"), NoiseKind::HtmlPage);
        assert_eq!(noise("<!DOCTYPE html><html></html>"), NoiseKind::HtmlPage);
        assert_eq!(noise("<HTML lang=\"en\">"), NoiseKind::HtmlPage);
        assert_eq!(noise("<div>oops</div>"), NoiseKind::MarkupFragment);
    }

    #[test]
    fn sse_control_lines() {
        assert_eq!(noise("data: partial"), NoiseKind::SseData);
        assert_eq!(noise("event: update"), NoiseKind::SseEvent);
        assert_eq!(noise("id: 12"), NoiseKind::SseId);
        assert_eq!(noise("retry: 3000"), NoiseKind::SseRetry);
        assert_eq!(noise(": keep-alive"), NoiseKind::Comment);
        assert!(noise("id: 12").is_sse_control());
    }

    #[test]
    fn heuristic_messages() {
        assert_eq!(noise("Internal Server Error"), NoiseKind::ErrorMessage);
        assert_eq!(noise("Connection established"), NoiseKind::ConnectionMessage);
        assert_eq!(noise("1699999999"), NoiseKind::Numeric);
        assert_eq!(noise("hello"), NoiseKind::PlainText);
    }

    #[test]
    fn json_scalars_are_noise() {
        assert_eq!(noise("42"), NoiseKind::Numeric);
        assert_eq!(noise("\"quoted\""), NoiseKind::PlainText);
        assert_eq!(noise("null"), NoiseKind::PlainText);
        assert_eq!(noise("true"), NoiseKind::PlainText);
        assert_eq!(noise("-1"), NoiseKind::PlainText);
    }

    #[test]
    fn truncated_json_is_noise() {
        assert_eq!(noise(r#"{"a":"#), NoiseKind::PlainText);
    }

    proptest! {
        #[test]
        fn classification_is_total(text in ".*") {
            match classify_at(&text, 1) {
                Classified::Structured(record) => {
                    let value: Value = serde_json::from_str(&text).unwrap();
                    prop_assert!(value.is_object() || value.is_array());
                    prop_assert_eq!(record.timestamp(), 1);
                }
                Classified::Noise(_) => {}
            }
        }
    }
}
