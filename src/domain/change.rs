//! A single file-level modification within a [`Commit`](super::commit::Commit).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "change")]
    Change,
    #[serde(rename = "new file")]
    NewFile,
    #[serde(rename = "deleted file")]
    DeletedFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub change_type: ChangeKind,
    pub diff: String,
    pub content: String,
    pub previous_content: String,
}

impl Change {
    /// Builds a change, blanking the fields that don't apply to `new_file`/`deleted_file`
    /// per the domain model: a new file has no previous content or diff; a deleted file
    /// has no resulting content or diff.
    pub fn new(
        path: impl Into<String>,
        change_type: ChangeKind,
        diff: impl Into<String>,
        content: impl Into<String>,
        previous_content: impl Into<String>,
    ) -> Self {
        let (diff, content, previous_content) = match change_type {
            ChangeKind::NewFile => (String::new(), content.into(), String::new()),
            ChangeKind::DeletedFile => (String::new(), String::new(), previous_content.into()),
            ChangeKind::Change => (diff.into(), content.into(), previous_content.into()),
        };
        Self {
            path: path.into(),
            change_type,
            diff,
            content,
            previous_content,
        }
    }
}
