//! Progress events pushed to a waiting caller while a batch runs.
//!
//! Each event is one JSON object tagged with `type`. On the wire an
//! event is framed as a server-sent-events `data:` line.

use serde::{Deserialize, Serialize};

use crate::types::FileOutcome;

/// One telemetry event of a transfer batch.
///
/// `percent` is absent when the batch total is unknown (indeterminate
/// progress); byte counts are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ProgressEvent {
    Init {
        total_size: u64,
        total_files: usize,
    },
    FileStart {
        file_name: String,
        file_index: usize,
        total_files: usize,
        file_size: u64,
    },
    Progress {
        file_name: String,
        file_size: u64,
        /// Bytes of this file moved so far.
        file_transferred: u64,
        /// Bytes of the whole batch moved so far.
        transferred_bytes: u64,
        total_bytes: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        percent: Option<f64>,
    },
    FileComplete {
        file_name: String,
        transferred_bytes: u64,
        total_bytes: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        percent: Option<f64>,
    },
    FileError {
        file_name: String,
        error: String,
    },
    Complete {
        transferred_bytes: u64,
        total_bytes: u64,
        #[serde(default)]
        results: Vec<FileOutcome>,
    },
}

impl ProgressEvent {
    /// Wire name of the event, as carried in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::FileStart { .. } => "fileStart",
            Self::Progress { .. } => "progress",
            Self::FileComplete { .. } => "fileComplete",
            Self::FileError { .. } => "fileError",
            Self::Complete { .. } => "complete",
        }
    }

    /// Returns true for the throttled, superseded-by-the-next kind of event.
    pub fn is_progress(&self) -> bool {
        matches!(self, Self::Progress { .. })
    }

    /// Returns true for the final event of a batch.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Renders the event as one event-stream frame: `data: <json>\n\n`.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("data: {json}\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;

    #[test]
    fn init_wire_format() {
        let ev = ProgressEvent::Init {
            total_size: 1024,
            total_files: 3,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert_eq!(json, r#"{"type":"init","totalSize":1024,"totalFiles":3}"#);
    }

    #[test]
    fn progress_without_total_has_no_percent() {
        let ev = ProgressEvent::Progress {
            file_name: "a.pcd".into(),
            file_size: 0,
            file_transferred: 10,
            transferred_bytes: 10,
            total_bytes: 0,
            percent: None,
        };
        let value: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["fileTransferred"], 10);
        assert!(value.get("percent").is_none());
    }

    #[test]
    fn frame_is_data_line() {
        let ev = ProgressEvent::FileError {
            file_name: "b.yaml".into(),
            error: "HTTP 404".into(),
        };
        let frame = ev.to_frame().unwrap();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
        assert!(frame.contains(r#""type":"fileError""#));
    }

    #[test]
    fn complete_carries_results() {
        let json = r#"{"type":"complete","transferredBytes":5,"totalBytes":5,
            "results":[{"fileName":"x","status":"failed","bytesTransferred":0,"error":"boom"}]}"#;
        let ev: ProgressEvent = serde_json::from_str(json).unwrap();
        assert!(ev.is_terminal());
        match ev {
            ProgressEvent::Complete { results, .. } => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].status, TaskStatus::Failed);
                assert_eq!(results[0].error.as_deref(), Some("boom"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn kind_matches_tag() {
        let events = [
            ProgressEvent::Init {
                total_size: 0,
                total_files: 0,
            },
            ProgressEvent::FileComplete {
                file_name: "a".into(),
                transferred_bytes: 1,
                total_bytes: 2,
                percent: Some(50.0),
            },
        ];
        for ev in events {
            let value = serde_json::to_value(&ev).unwrap();
            assert_eq!(value["type"], ev.kind());
        }
    }
}
