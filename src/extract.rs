//! Turns a line of free text into an `ExtractionBatch` by asking a language model for JSON.

use crate::api::Completion;
use crate::error::{ErrorType, IntoResult};
use crate::model::ExtractionBatch;
use crate::Result;
use anyhow::Context;
use tracing::{debug, trace};

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Sends expense text to a `Completion` service and decodes the answer.
pub struct Extractor {
    model: Box<dyn Completion + Send>,
}

impl Extractor {
    pub(crate) fn new(model: Box<dyn Completion + Send>) -> Self {
        Self { model }
    }

    /// Extracts the expenses described in `raw_text`.
    ///
    /// # Errors
    /// - `ErrorType::Upstream` when the completion call fails.
    /// - `ErrorType::Parse` when the response does not decode into valid expense records. The
    ///   message includes the cleaned response text.
    pub async fn extract(&mut self, raw_text: &str) -> Result<ExtractionBatch> {
        let response = self
            .model
            .complete(&prompt(raw_text))
            .await
            .context("The completion request failed")
            .pub_result(ErrorType::Upstream)?;
        trace!("Raw completion: {response}");

        let cleaned = strip_fences(&response);
        let batch = ExtractionBatch::from_json(cleaned)
            .with_context(|| format!("Unable to parse the model response: {cleaned}"))
            .pub_result(ErrorType::Parse)?;
        debug!("Extracted {} expense(s) from '{raw_text}'", batch.len());
        Ok(batch)
    }
}

/// The fixed instruction template, with `raw_text` embedded verbatim.
pub(crate) fn prompt(raw_text: &str) -> String {
    format!(
        r#"
    Parse: "{raw_text}"
    Return only JSON: {{"items": [{{"item": "name", "amount": 100, "category": "Food"}}]}}
    Categories: Food, Transport, Shopping, Other
    "#
    )
}

/// Removes code fences from a model response.
///
/// In order: the content of a ```` ```json ```` block if there is one, otherwise the content of the
/// first ```` ``` ```` block (dropping a bare language tag on the opening line), otherwise the whole
/// text. The result is trimmed. A block with no closing fence runs to the end of the text.
pub(crate) fn strip_fences(response: &str) -> &str {
    if let Some(start) = response.find(JSON_FENCE) {
        return block_content(&response[start + JSON_FENCE.len()..]).trim();
    }
    if let Some(start) = response.find(FENCE) {
        let block = block_content(&response[start + FENCE.len()..]);
        return drop_language_tag(block).trim();
    }
    response.trim()
}

/// Everything up to the closing fence, or the whole remainder if there is none.
fn block_content(after_opener: &str) -> &str {
    match after_opener.find(FENCE) {
        Some(end) => &after_opener[..end],
        None => after_opener,
    }
}

/// Drops the first line when it is a lone language tag such as `JSON` or `javascript`.
fn drop_language_tag(block: &str) -> &str {
    match block.split_once('\n') {
        Some((first, rest))
            if !first.trim().is_empty()
                && first.trim().chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            rest
        }
        _ => block,
    }
}
