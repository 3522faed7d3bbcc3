use docqa_core::ScoredChunk;
use docqa_generate::GenerationError;

pub const NOT_READY_MESSAGE: &str = "No documents loaded. Add documents to the docs folder and reload.";
pub const EMPTY_QUESTION_MESSAGE: &str = "Please ask a question.";

/// Retrieved chunk texts in rank order, separated by a blank line.
pub fn build_context(hits: &[ScoredChunk]) -> String {
    hits.iter().map(|h| h.chunk.text.as_str()).collect::<Vec<_>>().join("\n\n")
}

pub fn render_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful AI assistant. Answer the question based on the provided context. \
         Give a clear, direct answer without mentioning the context or saying \"based on the context\".\n\n\
         Context: {context}\n\n\
         Question: {question}\n\n\
         Answer the question naturally and comprehensively:"
    )
}

/// User-facing text for a failed generation call. Always starts with `Error:`.
pub fn backend_failure_message(err: &GenerationError) -> String {
    match err.endpoint() {
        Some(endpoint) => format!("Error: Could not get an answer from the generation backend at {endpoint}. {err}"),
        None => format!("Error: The generation backend is unavailable. {err}"),
    }
}
