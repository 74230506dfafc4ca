//! Tolerant extraction of structured records from model text
//!
//! Models wrap JSON in code fences or prose. The first parseable JSON value
//! starting at a `{` or `[` wins.

use crate::error::OracleError;
use crate::types::{InitialEntry, LetterReview};
use gkg_graph::ConceptId;
use serde::Deserialize;
use serde_json::Value;

/// First JSON object or array embedded in `text`
pub fn extract_json(text: &str) -> Result<Value, OracleError> {
    for (start, ch) in text.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            return Ok(value);
        }
    }
    Err(OracleError::Malformed(format!(
        "no JSON value in response: {}",
        preview(text)
    )))
}

#[derive(Deserialize)]
struct RawEntry {
    analysis: String,
    #[serde(default)]
    concepts: Vec<ConceptId>,
    #[serde(default)]
    concept: Option<ConceptId>,
}

#[derive(Deserialize)]
struct RawAnswer {
    answer: Vec<RawEntry>,
}

/// Initial classification: `{"answer": [...]}` or a bare array
pub fn parse_initial(text: &str) -> Result<Vec<InitialEntry>, OracleError> {
    let value = extract_json(text)?;
    let entries: Vec<RawEntry> = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value::<RawAnswer>(value).map(|a| a.answer)
    }
    .map_err(|e| OracleError::Malformed(format!("initial classification: {e}")))?;

    Ok(entries
        .into_iter()
        .map(|raw| {
            let mut concepts = raw.concepts;
            if let Some(single) = raw.concept {
                if !concepts.contains(&single) {
                    concepts.push(single);
                }
            }
            InitialEntry {
                analysis: raw.analysis,
                concepts,
            }
        })
        .collect())
}

/// Pick: `{"concept": "id"}` or a bare JSON string
pub fn parse_pick(text: &str) -> Result<ConceptId, OracleError> {
    #[derive(Deserialize)]
    struct Pick {
        concept: ConceptId,
    }

    let trimmed = text.trim();
    if let Ok(id) = serde_json::from_str::<String>(trimmed) {
        return Ok(ConceptId(id));
    }

    let value = extract_json(trimmed)?;
    serde_json::from_value::<Pick>(value)
        .map(|p| p.concept)
        .map_err(|e| OracleError::Malformed(format!("pick: {e}")))
}

/// Letter review record
pub fn parse_review(text: &str) -> Result<LetterReview, OracleError> {
    serde_json::from_value(extract_json(text)?)
        .map_err(|e| OracleError::Malformed(format!("letter review: {e}")))
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 120;
    match text.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
