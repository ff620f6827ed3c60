//! Console status display
//!
//! Renders a `UiState` snapshot as text. Records are shown newest first,
//! numbered from the total so a record keeps its number as newer ones arrive.

use std::fmt::Write as _;

use console::style;
use livesync_protocol::StreamRecord;

use crate::store::UiState;

/// Records shown per render unless asked otherwise.
pub const DEFAULT_VISIBLE_RECORDS: usize = 10;

/// Green while the status reports a live connection.
pub fn is_healthy(status: &str) -> bool {
    status.contains("Connected")
}

pub fn status_line(state: &UiState) -> String {
    let status = if is_healthy(&state.status) {
        style(&state.status).green().bold()
    } else {
        style(&state.status).red().bold()
    };
    format!("  Status: {}  ({} records)", status, state.records.len())
}

pub fn render(state: &UiState, visible_records: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", status_line(state));
    let _ = writeln!(out);

    let persisted = &state.persisted;
    let _ = writeln!(out, "  Count: {}", style(persisted.count).cyan());
    if !persisted.input_text.is_empty() {
        let _ = writeln!(out, "  Input: {}", persisted.input_text);
    }

    let _ = writeln!(out, "  Todos ({}):", persisted.todos.len());
    for (i, todo) in persisted.todos.iter().enumerate() {
        let _ = writeln!(out, "    {}. [ ] {}", i + 1, todo);
    }
    if !persisted.completed.is_empty() {
        let _ = writeln!(out, "  Completed ({}):", persisted.completed.len());
        for (i, done) in persisted.completed.iter().enumerate() {
            let _ = writeln!(out, "    {}. [x] {}", i + 1, style(done).dim());
        }
    }

    let _ = writeln!(out);
    if state.records.is_empty() {
        let _ = writeln!(out, "  {}", style("No stream data yet").dim());
    } else {
        let total = state.records.len();
        let _ = writeln!(out, "  Stream data (latest {}):", visible_records.min(total));
        for (offset, record) in state.records.iter().rev().take(visible_records).enumerate() {
            let _ = writeln!(out, "    {}", record_line(total - offset, record));
        }
    }
    out
}

pub fn record_line(number: usize, record: &StreamRecord) -> String {
    let mut fields = record.fields().clone();
    fields.remove(livesync_protocol::TIMESTAMP_KEY);
    let body = serde_json::Value::Object(fields).to_string();
    format!(
        "#{} {} {}",
        number,
        style(format_timestamp_ms(record.timestamp())).dim(),
        body
    )
}

/// Format epoch milliseconds as `HH:MM:SS.mmm` (UTC).
pub fn format_timestamp_ms(ms: i64) -> String {
    let ms = ms.max(0) as u64;
    let time_of_day = (ms / 1000) % 86400;

    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, ms % 1000)
}
