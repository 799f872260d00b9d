use serde::{Deserialize, Serialize};

/// A distributed trace as returned by `queryTrace`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// Spans of every segment in the trace.
    #[serde(default)]
    pub spans: Vec<Span>,
}

/// One span within a trace segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Span {
    pub trace_id: String,
    pub segment_id: String,
    pub span_id: i64,
    pub parent_span_id: i64,
    pub refs: Vec<Ref>,
    pub service_code: String,
    pub service_instance_name: String,
    pub start_time: i64,
    pub end_time: i64,
    pub endpoint_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub peer: Option<String>,
    pub component: Option<String>,
    pub is_error: Option<bool>,
    pub layer: Option<String>,
    pub tags: Vec<KeyValue>,
    pub logs: Vec<LogEntity>,
}

/// Link from a span to its parent in another segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ref {
    pub trace_id: String,
    pub parent_segment_id: String,
    pub parent_span_id: i64,
    #[serde(rename = "type")]
    pub kind: RefType,
}

/// Whether a reference crosses a process or a thread boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefType {
    CrossProcess,
    CrossThread,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// A timestamped log attached to a span.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntity {
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub data: Vec<KeyValue>,
}
