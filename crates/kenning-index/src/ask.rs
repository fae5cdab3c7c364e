//! Question answering over retrieved code and recalled memories.

use std::fmt::Write;
use std::sync::Arc;

use kenning_llm::privacy::{PrivacySanitizer, TermMasker};
use kenning_llm::tiers::TierChain;
use kenning_memory::RecalledMemory;

use crate::context::preview;
use crate::error::Result;
use crate::indexer::CodeIndex;
use crate::intent::QueryIntent;
use crate::retriever::SearchResult;

const ASK_RESULTS: usize = 3;
const ASK_MEMORIES: usize = 2;
const ASK_PREVIEW_CHARS: usize = 300;

/// Answers questions, diagnoses builds and vets commands by putting index
/// context in front of the LLM tiers.
#[derive(Debug, Clone)]
pub struct Advisor {
    pub(crate) index: Arc<CodeIndex>,
    pub(crate) tiers: Arc<TierChain>,
    privacy: bool,
}

impl Advisor {
    /// With `privacy` on, untrusted tiers see every known entity name masked.
    #[must_use]
    pub fn new(index: Arc<CodeIndex>, tiers: Arc<TierChain>, privacy: bool) -> Self {
        Self {
            index,
            tiers,
            privacy,
        }
    }

    #[must_use]
    pub fn index(&self) -> &Arc<CodeIndex> {
        &self.index
    }

    /// Answer `question` from the top matching entities and memories.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is not ready. LLM failures are reported
    /// in the returned text.
    pub async fn ask(&self, question: &str) -> Result<String> {
        let intent = self.index.retriever().classifier().recognize(question);
        let results = self.index.query(question, ASK_RESULTS).await?;
        let memories = match self.index.recall(question, ASK_MEMORIES).await {
            Ok(memories) => memories,
            Err(e) => {
                tracing::warn!("memory recall failed: {e}");
                Vec::new()
            }
        };
        let prompt = ask_prompt(question, &intent, &results, &memories);
        Ok(self.complete(&prompt).await)
    }

    /// Masker over every known entity name, when privacy is on.
    pub(crate) fn masker(&self) -> Option<TermMasker> {
        self.privacy
            .then(|| TermMasker::new(self.index.known_entity_names()))
    }

    /// Run `prompt` through the tier chain, masking for untrusted tiers when
    /// privacy is on.
    pub(crate) async fn complete(&self, prompt: &str) -> String {
        let masker = self.masker();
        let sanitizer = masker.as_ref().map(|m| m as &dyn PrivacySanitizer);
        match self.tiers.complete(prompt, sanitizer).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("no tier could answer: {e}");
                format!("Unable to get an answer: {e}")
            }
        }
    }
}

fn ask_prompt(
    question: &str,
    intent: &QueryIntent,
    results: &[SearchResult],
    memories: &[RecalledMemory],
) -> String {
    let mut context = results
        .iter()
        .map(|r| {
            format!(
                "--- {} ({}) ---\n{}",
                r.entity.name,
                r.entity.kind,
                preview(&r.entity.content, ASK_PREVIEW_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    if !memories.is_empty() {
        context.push_str("\n\n--- RELEVANT MEMORIES ---\n");
        let lines: Vec<String> = memories
            .iter()
            .map(|m| format!("MEMORY ({}): {}", m.record.kind, m.record.content))
            .collect();
        context.push_str(&lines.join("\n"));
    }

    let mut prompt = String::from(
        "You are a code assistant. Answer based on the codebase context and the user's intent.\n\n",
    );
    let _ = writeln!(prompt, "INTENT: {}", intent.kind);
    let _ = writeln!(prompt, "CONCEPTS: {}", intent.concepts.join(", "));
    let _ = writeln!(prompt, "CONTEXT: {}\n", intent.context);
    let _ = writeln!(prompt, "CODEBASE CONTEXT:\n{context}\n");
    let _ = writeln!(prompt, "QUESTION: {question}\n");
    prompt.push_str("Answer concisely and reference specific code entities when relevant.\n");
    prompt
}
