//! Request bodies accepted by the control server's map endpoints.

use serde::{Deserialize, Serialize};

/// One file to fetch from the robot.
///
/// Browsers send either `remotePath`/`fileName`/`fileSize` or the
/// short `path`/`name`/`size` spelling; both are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileSpec {
    #[serde(default, alias = "path")]
    pub remote_path: Option<String>,
    #[serde(default, alias = "name")]
    pub file_name: Option<String>,
    #[serde(default, alias = "size")]
    pub file_size: Option<u64>,
}

/// `POST /api/maps/download-from-robot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadFromRobotRequest {
    pub robot_url: String,
    pub map_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub files: Vec<RemoteFileSpec>,
}

impl DownloadFromRobotRequest {
    /// Local folder the batch writes into: `folderName`, else `mapName`.
    pub fn target_folder(&self) -> &str {
        match self.folder_name.as_deref() {
            Some(f) if !f.trim().is_empty() => f.trim(),
            _ => self.map_name.trim(),
        }
    }
}

/// One local file to push to the robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFileSpec {
    /// Relative to the maps directory; a leading `/maps/` is tolerated.
    pub local_path: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_path: Option<String>,
}

/// `POST /api/maps/send-to-robot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendToRobotRequest {
    pub robot_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_path: Option<String>,
    #[serde(default)]
    pub files: Vec<LocalFileSpec>,
}

/// Entry of the `filesToCopy` form field: copy `path` (relative to the
/// maps directory) to `targetPath` (relative to the new map folder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyInstruction {
    pub path: String,
    pub target_path: String,
}

/// `config.json` stored at the root of every map folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
}
