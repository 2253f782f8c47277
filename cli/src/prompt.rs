//! Prompt Composer: turns retrieval results into the single prompt string
//! handed to the Generator Driver.
//!
//! Grounded on `original_source/LLM/loki_llm.py`'s `generate_prompt()` for
//! the overall shape (role preamble, context block, trailing
//! `Question:`/`Answer:` labels), restructured into a typed builder in the
//! style of `quarry_index::RagConfigBuilder` rather than a raw format
//! string, with a mandatory disclaimer the prototype didn't carry.

use quarry_index::SearchResult;

/// Disclaimer appended to every composed prompt's instruction block.
pub const DISCLAIMER: &str =
    "This answer is generated from locally indexed documents and may be incomplete or out of date.";

/// Builds prompts from a query and its retrieval results.
///
/// `role_preamble` and `disclaimer` are configurable so a deployment can
/// reword them without forking the composer; defaults match the prototype's
/// own wording, translated out of first person ("LOKI") into a generic
/// offline-assistant framing.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    role_preamble: String,
    disclaimer: String,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self {
            role_preamble: "You are an offline research assistant with access to a local document library.".to_string(),
            disclaimer: DISCLAIMER.to_string(),
        }
    }
}

impl PromptComposer {
    /// Creates a composer with the default preamble and disclaimer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the role preamble.
    #[must_use]
    pub fn role_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.role_preamble = preamble.into();
        self
    }

    /// Overrides the trailing disclaimer.
    #[must_use]
    pub fn disclaimer(mut self, disclaimer: impl Into<String>) -> Self {
        self.disclaimer = disclaimer.into();
        self
    }

    /// Composes the full prompt. Source numbers are 1-based and assigned in
    /// the order `results` appear; this must match any user-facing source
    /// list rendered for the same query.
    #[must_use]
    pub fn compose(&self, question: &str, results: &[SearchResult]) -> String {
        let context = self.context_block(results);

        format!(
            "{preamble}\n\
            Answer the question using only the information in the CONTEXT below.\n\
            Cite sources inline as [Source N], where N matches the source's number in CONTEXT.\n\
            If the context does not contain enough information to answer, say so plainly.\n\
            Keep the answer focused; do not repeat the context verbatim.\n\n\
            CONTEXT:\n{context}\n\n\
            QUESTION:\n{question}\n\n\
            Answer:\n\n\
            {disclaimer}",
            preamble = self.role_preamble,
            disclaimer = self.disclaimer,
        )
    }

    fn context_block(&self, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return "(no relevant documents found)".to_string();
        }

        results
            .iter()
            .enumerate()
            .map(|(index, result)| {
                let source_number = index + 1;
                let category = result.chunk.metadata.get("category").map_or("unknown", String::as_str);
                let file_name = result
                    .chunk
                    .metadata
                    .get("file_name")
                    .map_or("unknown", String::as_str);
                let label = match result.chunk.page_num {
                    Some(page) => format!("[Source {source_number}: {category}/{file_name}, Page {page}]"),
                    None => format!("[Source {source_number}: {category}/{file_name}]"),
                };

                format!("{label}\n{}", result.chunk.text)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_index::{Chunk, Metadata};

    fn result(text: &str, category: &str, file_name: &str) -> SearchResult {
        result_with_page(text, category, file_name, None)
    }

    fn result_with_page(text: &str, category: &str, file_name: &str, page_num: Option<u32>) -> SearchResult {
        let mut metadata = Metadata::new();
        metadata.insert("category".to_string(), category.to_string());
        metadata.insert("file_name".to_string(), file_name.to_string());

        SearchResult {
            chunk: Chunk {
                id: "c1".to_string(),
                text: text.to_string(),
                source_id: "doc1".to_string(),
                index: 0,
                metadata,
                content_hash: 0,
                page_num,
                vector_id: 0,
            },
            score: 0.9,
        }
    }

    #[test]
    fn numbers_sources_in_order_and_includes_disclaimer() {
        let composer = PromptComposer::new();
        let results = vec![
            result("water boils at 100C", "survival", "water.pdf"),
            result("knots for tying", "survival", "knots.pdf"),
        ];

        let prompt = composer.compose("how do I purify water?", &results);
        assert!(prompt.contains("[Source 1: survival/water.pdf]"));
        assert!(prompt.contains("[Source 2: survival/knots.pdf]"));
        assert!(prompt.contains(DISCLAIMER));
        assert!(prompt.contains("how do I purify water?"));
    }

    #[test]
    fn page_number_is_rendered_when_known() {
        let composer = PromptComposer::new();
        let results = vec![result_with_page("boil for 1 minute", "survival", "water.pdf", Some(12))];

        let prompt = composer.compose("how do I purify water?", &results);
        assert!(prompt.contains("[Source 1: survival/water.pdf, Page 12]"));
    }

    #[test]
    fn empty_results_produce_a_placeholder_context() {
        let composer = PromptComposer::new();
        let prompt = composer.compose("anything?", &[]);
        assert!(prompt.contains("(no relevant documents found)"));
    }
}
