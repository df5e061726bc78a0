//! A snapshot of agent-authored file changes, forwarded and stored opaquely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::change::Change;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub date: DateTime<Utc>,
    pub title: String,
    pub changes: Vec<Change>,
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Commit {}
