//! Data models for DSpace submissions
//!
//! This module contains the core data structures passed between the metadata
//! reader, the submission workflow driver and the bulk dispatcher.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::constants::dspace;

/// JSON-Patch operation kinds used against workspace items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOp::Add => write!(f, "add"),
            PatchOp::Replace => write!(f, "replace"),
        }
    }
}

/// A single JSON-Patch operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: Value,
}

impl PatchOperation {
    /// Operation setting the license grant flag
    pub fn license_granted(op: PatchOp) -> Self {
        Self {
            op,
            path: dspace::LICENSE_GRANTED_PATH.to_string(),
            value: Value::Bool(true),
        }
    }
}

/// One metadata value with an optional language tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl MetadataValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: None,
        }
    }
}

/// Ordered list of metadata operations applied to a workspace item
///
/// Every field gets exactly one `add` operation carrying all of its values,
/// so the order of operations does not affect the resulting item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataPatch {
    operations: Vec<PatchOperation>,
}

impl MetadataPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add values for a Dublin Core field in the given submission section
    ///
    /// Values for a field already present are appended to its operation.
    pub fn add_field(&mut self, section: &str, field: &str, value: MetadataValue) {
        let path = format!("/sections/{}/{}", section, field);
        let encoded = serde_json::to_value(&value).unwrap_or_else(|_| json!({ "value": value.value }));

        if let Some(existing) = self.operations.iter_mut().find(|op| op.path == path) {
            if let Value::Array(values) = &mut existing.value {
                values.push(encoded);
            }
            return;
        }

        self.operations.push(PatchOperation {
            op: PatchOp::Add,
            path,
            value: Value::Array(vec![encoded]),
        });
    }

    /// All values recorded for a field, in insertion order
    pub fn field_values(&self, field: &str) -> Vec<String> {
        let suffix = format!("/{}", field);
        self.operations
            .iter()
            .filter(|op| op.path.ends_with(&suffix))
            .filter_map(|op| op.value.as_array())
            .flatten()
            .filter_map(|v| v.get("value").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }
}

/// Lifecycle of a workspace item while this client owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkspaceState {
    Created,
    MetadataAttached,
    FileAttached,
    LicenseAccepted,
    /// Handed off to the workflow engine; terminal for this client
    Submitted,
}

impl WorkspaceState {
    /// The only state reachable from this one
    pub fn next(self) -> Option<WorkspaceState> {
        match self {
            WorkspaceState::Created => Some(WorkspaceState::MetadataAttached),
            WorkspaceState::MetadataAttached => Some(WorkspaceState::FileAttached),
            WorkspaceState::FileAttached => Some(WorkspaceState::LicenseAccepted),
            WorkspaceState::LicenseAccepted => Some(WorkspaceState::Submitted),
            WorkspaceState::Submitted => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == WorkspaceState::Submitted
    }
}

impl fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkspaceState::Created => "created",
            WorkspaceState::MetadataAttached => "metadata-attached",
            WorkspaceState::FileAttached => "file-attached",
            WorkspaceState::LicenseAccepted => "license-accepted",
            WorkspaceState::Submitted => "submitted",
        };
        f.write_str(label)
    }
}

/// An in-progress DSpace submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceItem {
    pub id: u64,
    pub owning_collection: String,
    state: WorkspaceState,
}

impl WorkspaceItem {
    pub fn new(id: u64, owning_collection: impl Into<String>) -> Self {
        Self {
            id,
            owning_collection: owning_collection.into(),
            state: WorkspaceState::Created,
        }
    }

    pub fn state(&self) -> WorkspaceState {
        self.state
    }

    /// Move one step forward; returns false if `to` is not the next state
    pub fn advance(&mut self, to: WorkspaceState) -> bool {
        if self.state.next() == Some(to) {
            self.state = to;
            true
        } else {
            false
        }
    }
}

/// Where an upload task came from, for holding-area moves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOrigin {
    /// An item folder holding `metadata.xml` and a content file
    ItemFolder(PathBuf),
    /// A loose content file with a Dublin Core sidecar
    LooseFile,
}

/// One unit of bulk work: (item name, metadata source, content file)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub name: String,
    pub metadata_path: PathBuf,
    pub content_path: PathBuf,
    pub origin: TaskOrigin,
}

impl UploadTask {
    pub fn from_folder(folder: &Path, metadata_path: PathBuf, content_path: PathBuf) -> Self {
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| folder.display().to_string());
        Self {
            name,
            metadata_path,
            content_path,
            origin: TaskOrigin::ItemFolder(folder.to_path_buf()),
        }
    }

    pub fn from_loose_file(content_path: PathBuf, metadata_path: PathBuf) -> Self {
        let name = content_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| content_path.display().to_string());
        Self {
            name,
            metadata_path,
            content_path,
            origin: TaskOrigin::LooseFile,
        }
    }
}

/// Result of a completed five-step submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub workspace_id: u64,
    /// Workflow item id, when the server returned one
    pub workflow_item_id: Option<u64>,
    pub bitstream_name: String,
}

/// Collection listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub uuid: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_groups_values_per_field() {
        let mut patch = MetadataPatch::new();
        patch.add_field("traditionalpageone", "dc.contributor.author", MetadataValue::new("A"));
        patch.add_field("traditionalpageone", "dc.title", MetadataValue::new("T"));
        patch.add_field("traditionalpageone", "dc.contributor.author", MetadataValue::new("B"));

        assert_eq!(patch.len(), 2);
        assert_eq!(patch.field_values("dc.contributor.author"), vec!["A", "B"]);
        assert_eq!(patch.field_values("dc.title"), vec!["T"]);
    }

    #[test]
    fn test_patch_serializes_as_json_patch() {
        let mut patch = MetadataPatch::new();
        patch.add_field("traditionalpageone", "dc.title", MetadataValue::new("Sample"));

        let encoded = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            encoded,
            json!([{
                "op": "add",
                "path": "/sections/traditionalpageone/dc.title",
                "value": [{ "value": "Sample" }]
            }])
        );
    }

    #[test]
    fn test_language_tag_is_kept() {
        let mut patch = MetadataPatch::new();
        patch.add_field(
            "traditionalpageone",
            "dc.title",
            MetadataValue {
                value: "ሰላም".to_string(),
                language: Some("am".to_string()),
            },
        );
        let encoded = serde_json::to_value(&patch).unwrap();
        assert_eq!(encoded[0]["value"][0]["language"], "am");
    }

    #[test]
    fn test_workspace_state_is_strictly_linear() {
        let mut item = WorkspaceItem::new(12, "c0ffee");
        assert_eq!(item.state(), WorkspaceState::Created);

        // Skipping a step is refused
        assert!(!item.advance(WorkspaceState::FileAttached));
        assert!(item.advance(WorkspaceState::MetadataAttached));
        assert!(item.advance(WorkspaceState::FileAttached));

        // No backward transitions
        assert!(!item.advance(WorkspaceState::MetadataAttached));
        assert!(item.advance(WorkspaceState::LicenseAccepted));
        assert!(item.advance(WorkspaceState::Submitted));
        assert!(item.state().is_terminal());
        assert_eq!(item.state().next(), None);
    }

    #[test]
    fn test_license_operation() {
        let op = PatchOperation::license_granted(PatchOp::Replace);
        let encoded = serde_json::to_value(&op).unwrap();
        assert_eq!(
            encoded,
            json!({ "op": "replace", "path": "/sections/license/granted", "value": true })
        );
    }

    #[test]
    fn test_task_names() {
        let task = UploadTask::from_folder(
            Path::new("/data/setA/item_001"),
            PathBuf::from("/data/setA/item_001/metadata.xml"),
            PathBuf::from("/data/setA/item_001/doc.pdf"),
        );
        assert_eq!(task.name, "item_001");
        assert_eq!(
            task.origin,
            TaskOrigin::ItemFolder(PathBuf::from("/data/setA/item_001"))
        );

        let loose = UploadTask::from_loose_file(
            PathBuf::from("/hot/scan.pdf"),
            PathBuf::from("/hot/scan_dublin_core.xml"),
        );
        assert_eq!(loose.name, "scan.pdf");
        assert_eq!(loose.origin, TaskOrigin::LooseFile);
    }
}
