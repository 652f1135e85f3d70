//! Whole-corpus snapshot for eager mode
//!
//! Eager mode skips tools entirely: every document is concatenated into the
//! system prompt once at startup and each query is a single model call.
//! Only practical for small corpora, but useful as a baseline.

use tracing::info;

use super::accessor::Corpus;
use super::search::DocumentWalk;

const DOCS_START: &str = "--- DOCUMENTATION START ---";
const DOCS_END: &str = "--- DOCUMENTATION END ---";

/// Every document in the corpus, concatenated with file markers
#[derive(Debug, Clone)]
pub struct CorpusSnapshot {
    /// Concatenated `--- FILE: path ---` sections
    pub text: String,
    /// Number of documents included
    pub documents: usize,
}

impl CorpusSnapshot {
    /// Walk the corpus in name order and concatenate every readable document
    pub fn load(corpus: &Corpus) -> Self {
        let mut text = String::new();
        let mut documents = 0;

        let walk = DocumentWalk::new(
            corpus.tree(),
            corpus.root(),
            corpus.root(),
            |p: &std::path::Path| corpus.is_document(p),
        );
        for path in walk.into_iter().flatten() {
            let Ok(content) = corpus.tree().read_to_string(&path) else {
                continue;
            };
            text.push_str(&format!(
                "\n--- FILE: {} ---\n{}\n",
                corpus.relative(&path),
                content
            ));
            documents += 1;
        }

        info!(
            documents,
            size_kb = text.len() / 1024,
            approx_tokens = text.len() / 4,
            "Loaded corpus snapshot"
        );

        Self { text, documents }
    }

    /// Append the snapshot to a base system prompt
    pub fn system_prompt(&self, base: &str) -> String {
        format!("{}\n\n{}\n{}\n{}", base, DOCS_START, self.text, DOCS_END)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CorpusConfig, MemoryTree};

    #[test]
    fn test_snapshot_concatenates_documents_in_order() {
        let tree = MemoryTree::new("/docs")
            .with_file("/docs/b.md", "bee")
            .with_file("/docs/a/x.mdx", "ex")
            .with_file("/docs/logo.svg", "<svg/>")
            .with_unreadable("/docs/c.md");
        let corpus = Corpus::with_tree("/docs", tree, &CorpusConfig::default());

        let snapshot = CorpusSnapshot::load(&corpus);
        assert_eq!(snapshot.documents, 2);
        assert_eq!(
            snapshot.text,
            "\n--- FILE: a/x.mdx ---\nex\n\n--- FILE: b.md ---\nbee\n"
        );
    }

    #[test]
    fn test_system_prompt_wraps_snapshot() {
        let snapshot = CorpusSnapshot {
            text: "DOCS".to_string(),
            documents: 1,
        };
        let prompt = snapshot.system_prompt("BASE");
        assert!(prompt.starts_with("BASE\n\n--- DOCUMENTATION START ---"));
        assert!(prompt.ends_with("DOCS\n--- DOCUMENTATION END ---"));
    }
}
