//! Prompt-template loading for the summarizer (§4.8).
//!
//! One plain-text file per [`PromptKind`], loaded once at startup from a
//! `prompts/` directory alongside the binary. A missing file disables
//! summarization for that kind only; logged once, not per call.

use std::collections::HashMap;
use std::path::Path;

use super::PromptKind;

const ALL_KINDS: [PromptKind; 4] = [
    PromptKind::QueryRequest,
    PromptKind::QueryResponse,
    PromptKind::ToolCall,
    PromptKind::ToolResult,
];

pub struct PromptTemplates {
    templates: HashMap<PromptKind, String>,
}

impl PromptTemplates {
    /// Reads `<dir>/<kind>.txt` for each prompt kind; missing files are
    /// skipped with a single warning.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut templates = HashMap::new();
        for kind in ALL_KINDS {
            let path = dir.join(format!("{}.txt", kind.file_stem()));
            match std::fs::read_to_string(&path) {
                Ok(contents) => {
                    templates.insert(kind, contents);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "prompt template missing; summaries disabled for this kind"
                    );
                }
            }
        }
        Self { templates }
    }

    pub fn get(&self, kind: PromptKind) -> Option<&str> {
        self.templates.get(&kind).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_disables_all_kinds_without_panicking() {
        let templates = PromptTemplates::load_from_dir("/nonexistent/prompts/dir");
        assert!(templates.get(PromptKind::QueryRequest).is_none());
    }

    #[test]
    fn loads_present_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("summarize_query_request.txt"), "Summarize this query:").unwrap();
        let templates = PromptTemplates::load_from_dir(dir.path());
        assert_eq!(
            templates.get(PromptKind::QueryRequest),
            Some("Summarize this query:")
        );
        assert!(templates.get(PromptKind::ToolCall).is_none());
    }
}
