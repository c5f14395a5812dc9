//! Progress and result events of a job, and the sinks that deliver them.
//!
//! One event sequence feeds two delivery modes: buffered (collected into a
//! [`JobReport`] at the end) and streamed (one JSON object per line, flushed
//! as soon as it is produced).

use std::io::Write;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use stylesync_core::{AssortmentDetail, CatalogItem, StockBox, TableSnapshot, VariantBox};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub t: String,
    pub m: String,
}

impl LogLine {
    #[must_use]
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            t: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            m: message.into(),
        }
    }
}

/// Identifying fields of the item an outcome belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRef {
    pub style_no: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub style_name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub brand: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub season: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub supplier: String,
}

impl From<&CatalogItem> for ItemRef {
    fn from(item: &CatalogItem) -> Self {
        Self {
            style_no: item.style_no.clone(),
            style_name: item.style_name.clone(),
            url: item.href.clone(),
            brand: item.brand.clone(),
            season: item.season.clone(),
            supplier: item.supplier.clone(),
        }
    }
}

/// Result of one extraction step: `data` on success, `error` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome<T> {
    pub ok: bool,
    pub index: usize,
    #[serde(flatten)]
    pub item: ItemRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ItemOutcome<T> {
    pub fn from_result<E: std::fmt::Display>(
        index: usize,
        item: ItemRef,
        result: Result<T, E>,
    ) -> Self {
        match result {
            Ok(data) => Self {
                ok: true,
                index,
                item,
                data: Some(data),
                error: None,
            },
            Err(e) => Self {
                ok: false,
                index,
                item,
                data: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// A listed catalog row reported without detail extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowEvent {
    pub ok: bool,
    #[serde(flatten)]
    pub item: CatalogItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneEvent {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractionEvent {
    Log(LogLine),
    Table(ItemOutcome<TableSnapshot>),
    Row(RowEvent),
    Item(ItemOutcome<AssortmentDetail>),
    Stock(ItemOutcome<Vec<StockBox>>),
    StatstockFree(ItemOutcome<Vec<VariantBox>>),
    Done(DoneEvent),
}

impl ExtractionEvent {
    #[must_use]
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log(_))
    }

    /// Serialize as one NDJSON line, newline included.
    #[must_use]
    pub fn to_ndjson_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            let fallback = LogLine::now(format!("event serialization failed: {e}"));
            serde_json::json!({ "type": "log", "t": fallback.t, "m": fallback.m }).to_string()
        });
        line.push('\n');
        line
    }
}

/// Receives events in the order the job produces them.
pub trait EventSink: Send {
    fn emit(&mut self, event: ExtractionEvent);
}

/// Thin wrapper the pipeline logs through: every message becomes a `log`
/// event and is mirrored to `tracing`.
pub struct Reporter<'a> {
    sink: &'a mut dyn EventSink,
}

impl<'a> Reporter<'a> {
    pub fn new(sink: &'a mut dyn EventSink) -> Self {
        Self { sink }
    }

    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "stylesync::job", "{message}");
        self.sink.emit(ExtractionEvent::Log(LogLine::now(message)));
    }

    pub fn emit(&mut self, event: ExtractionEvent) {
        self.sink.emit(event);
    }
}

/// Buffered delivery: the whole job's outcome in one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub logs: Vec<LogLine>,
    pub items: Vec<ExtractionEvent>,
}

#[derive(Debug, Default)]
pub struct BufferedSink {
    logs: Vec<LogLine>,
    items: Vec<ExtractionEvent>,
    done: Option<DoneEvent>,
}

impl BufferedSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the collected events into a report. A job that never reached
    /// `done` is reported as failed.
    #[must_use]
    pub fn into_report(self) -> JobReport {
        let (ok, error) = match self.done {
            Some(done) => (done.ok, done.error),
            None => (false, Some("job ended without a result".to_string())),
        };
        JobReport {
            ok,
            error,
            logs: self.logs,
            items: self.items,
        }
    }
}

impl EventSink for BufferedSink {
    fn emit(&mut self, event: ExtractionEvent) {
        match event {
            ExtractionEvent::Log(line) => self.logs.push(line),
            ExtractionEvent::Done(done) => self.done = Some(done),
            other => self.items.push(other),
        }
    }
}

/// Streaming delivery over a channel; the receiving side serializes.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<ExtractionEvent>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(tx: UnboundedSender<ExtractionEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, event: ExtractionEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event receiver dropped; discarding event");
        }
    }
}

/// Streaming delivery straight into a writer (stdout for the CLI).
pub struct WriterSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> EventSink for WriterSink<W> {
    fn emit(&mut self, event: ExtractionEvent) {
        let line = event.to_ndjson_line();
        if let Err(e) = self
            .writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.flush())
        {
            tracing::warn!(error = %e, "failed to write event");
        }
    }
}

/// Splits an NDJSON byte stream into events.
///
/// Chunks may end mid-line (or mid-character); the incomplete tail is kept
/// until more bytes arrive. Blank lines are skipped.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    pending: Vec<u8>,
}

impl NdjsonDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<ExtractionEvent, serde_json::Error>> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Decode whatever remains after the stream ended. A trailing partial
    /// line that does not parse is dropped.
    #[must_use]
    pub fn finish(self) -> Option<ExtractionEvent> {
        decode_line(&self.pending).and_then(Result::ok)
    }
}

fn decode_line(line: &[u8]) -> Option<Result<ExtractionEvent, serde_json::Error>> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_slice(trimmed))
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
