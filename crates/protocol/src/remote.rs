//! JSON bodies of the robot-side file service (`/api/files/*`).

use serde::{Deserialize, Serialize};

/// `GET /health` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Kind of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry of a single-level directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// `null` for directories.
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl RemoteEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// `GET /list?path=` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    pub success: bool,
    #[serde(default)]
    pub items: Vec<RemoteEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /upload` response. Error responses of every endpoint share
/// this `{success, message}` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_listing() {
        let json = r#"{"success":true,"items":[
            {"name":"maps","type":"directory","size":null,"path":"maps"},
            {"name":"office.pgm","type":"file","size":2048,"path":"maps/office.pgm"}
        ]}"#;
        let resp: ListResponse = serde_json::from_str(json).unwrap();
        assert!(resp.success);
        assert_eq!(resp.items.len(), 2);
        assert!(!resp.items[0].is_file());
        assert_eq!(resp.items[0].size, None);
        assert!(resp.items[1].is_file());
        assert_eq!(resp.items[1].size, Some(2048));
    }

    #[test]
    fn parse_failed_listing_without_items() {
        let json = r#"{"success":false,"message":"Path does not exist"}"#;
        let resp: ListResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.success);
        assert!(resp.items.is_empty());
        assert_eq!(resp.message.as_deref(), Some("Path does not exist"));
    }

    #[test]
    fn parse_health() {
        let resp: HealthResponse =
            serde_json::from_str(r#"{"success":true,"message":"File service is running"}"#)
                .unwrap();
        assert!(resp.success);
    }
}
