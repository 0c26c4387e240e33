//! Defensive decoding of provider output into a [`SentenceAnalysis`].
//!
//! Providers disagree on wrapping (bare JSON, fenced markdown, JSON encoded as
//! a string) and on field names, so decoding goes through a loose
//! `serde_json::Value` first and only then into the canonical shape.

use crate::analysis::types::{GrammarRole, SentenceAnalysis, SentenceStructure};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)\s*```").expect("code fence pattern"));

static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([.,!?;:])").expect("punctuation pattern"));

/// Alternative field names seen from providers, mapped to the canonical name.
const FIELD_SYNONYMS: &[(&str, &str)] = &[
    ("sentence", "originalSentence"),
    ("original_sentence", "originalSentence"),
    ("mainClauseStructure", "structureType"),
    ("structure", "structureType"),
    ("structure_type", "structureType"),
    ("word_roles", "wordRoles"),
    ("roles", "wordRoles"),
    ("tokens", "words"),
    ("skeleton_indices", "skeletonIndices"),
    ("skeleton", "skeletonIndices"),
];

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResponseFormatError {
    #[error("Empty response from AI")]
    Empty,
    #[error("Failed to parse AI response: {message}. Content: {preview}")]
    InvalidJson { message: String, preview: String },
    #[error("Invalid response format: expected a JSON object")]
    NotAnObject,
    #[error("Invalid response format: missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Invalid response format: '{field}' {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Decoded artifact plus what had to be repaired to get it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub analysis: SentenceAnalysis,
    /// Raw structure value that was replaced by the default
    pub structure_coerced_from: Option<String>,
    /// Role entries pointing past the end of `words`
    pub dropped_roles: usize,
    /// Skeleton indices out of range or not carrying a skeleton role
    pub dropped_skeleton: Vec<usize>,
}

pub fn parse_ai_response(content: &str) -> Result<ParsedResponse, ResponseFormatError> {
    let mut data = decode_json(content)?;
    let object = data.as_object_mut().ok_or(ResponseFormatError::NotAnObject)?;

    remap_synonyms(object);
    if !is_present(object.get("originalSentence"))
        && let Some(sentence) = object.get("words").and_then(reconstruct_sentence)
    {
        object.insert("originalSentence".to_string(), Value::String(sentence));
    }

    let missing: Vec<&'static str> = ["originalSentence", "words", "wordRoles"]
        .into_iter()
        .filter(|field| !is_present(object.get(*field)))
        .collect();
    if !missing.is_empty() {
        return Err(ResponseFormatError::MissingFields(missing));
    }

    let original_sentence = match &object["originalSentence"] {
        Value::String(s) => s.clone(),
        other => return Err(invalid("originalSentence", format!("is not a string: {}", other))),
    };
    let words = parse_words(&object["words"])?;
    let (word_roles, dropped_roles) = parse_roles(&object["wordRoles"], words.len())?;

    let (structure_type, structure_coerced_from) = match object.get("structureType") {
        Some(Value::String(raw)) => match SentenceStructure::parse(raw) {
            Some(structure) => (structure, None),
            None => (SentenceStructure::default(), Some(raw.clone())),
        },
        other => (
            SentenceStructure::default(),
            Some(other.cloned().unwrap_or(Value::Null).to_string()),
        ),
    };

    let (skeleton_indices, dropped_skeleton) =
        parse_skeleton(object.get("skeletonIndices"), &word_roles, words.len());

    let explanation = object
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let options = object
        .get("options")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ParsedResponse {
        analysis: SentenceAnalysis {
            original_sentence,
            words,
            word_roles,
            structure_type,
            skeleton_indices,
            explanation,
            options,
            level: None,
        },
        structure_coerced_from,
        dropped_roles,
        dropped_skeleton,
    })
}

/// Strip a markdown fence if there is one and return the JSON text inside.
pub fn strip_code_fences(content: &str) -> &str {
    if let Some(captures) = CODE_FENCE.captures(content)
        && let Some(inner) = captures.get(1)
    {
        return inner.as_str();
    }
    content.trim()
}

fn decode_json(content: &str) -> Result<Value, ResponseFormatError> {
    if content.trim().is_empty() {
        return Err(ResponseFormatError::Empty);
    }

    let text = strip_code_fences(content);
    let first_err = match serde_json::from_str::<Value>(text) {
        Ok(Value::String(inner)) => {
            // double-encoded: a JSON string holding the object
            return serde_json::from_str(strip_code_fences(&inner)).map_err(|e| {
                ResponseFormatError::InvalidJson {
                    message: e.to_string(),
                    preview: preview(&inner),
                }
            });
        }
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    // prose around the object
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}'))
        && start < end
        && let Ok(value) = serde_json::from_str::<Value>(&text[start..=end])
    {
        return Ok(value);
    }

    Err(ResponseFormatError::InvalidJson {
        message: first_err.to_string(),
        preview: preview(text),
    })
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

fn remap_synonyms(object: &mut Map<String, Value>) {
    for (synonym, canonical) in FIELD_SYNONYMS {
        if is_present(object.get(*canonical)) {
            continue;
        }
        if let Some(value) = object.remove(*synonym) {
            object.insert(canonical.to_string(), value);
        }
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Join tokens with spaces and pull punctuation back onto the previous word.
pub fn reconstruct_sentence(words: &Value) -> Option<String> {
    let tokens: Vec<&str> = words.as_array()?.iter().filter_map(Value::as_str).collect();
    if tokens.is_empty() {
        return None;
    }
    let joined = tokens.join(" ");
    Some(SPACE_BEFORE_PUNCT.replace_all(&joined, "$1").into_owned())
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ResponseFormatError {
    ResponseFormatError::InvalidField {
        field,
        reason: reason.into(),
    }
}

fn parse_words(value: &Value) -> Result<Vec<String>, ResponseFormatError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid("words", "is not an array"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(invalid("words", format!("item {} is not a string: {}", i, other))),
        })
        .collect()
}

/// Normalize roles given as an index-implicit array or an index-keyed object.
fn parse_roles(
    value: &Value,
    word_count: usize,
) -> Result<(BTreeMap<usize, GrammarRole>, usize), ResponseFormatError> {
    let entries: Vec<(usize, &Value)> = match value {
        Value::Array(items) => items.iter().enumerate().collect(),
        Value::Object(map) => map
            .iter()
            .map(|(key, role)| {
                key.trim()
                    .parse::<usize>()
                    .map(|index| (index, role))
                    .map_err(|_| invalid("wordRoles", format!("key '{}' is not an index", key)))
            })
            .collect::<Result<_, _>>()?,
        _ => return Err(invalid("wordRoles", "is neither an array nor an object")),
    };

    let mut roles = BTreeMap::new();
    let mut dropped = 0;
    for (index, role) in entries {
        let label = match role {
            Value::String(label) => label,
            Value::Null => continue,
            other => {
                return Err(invalid(
                    "wordRoles",
                    format!("entry {} is not a string: {}", index, other),
                ));
            }
        };
        if index >= word_count {
            dropped += 1;
            continue;
        }
        roles.insert(index, GrammarRole::from_label(label));
    }
    Ok((roles, dropped))
}

fn parse_skeleton(
    value: Option<&Value>,
    roles: &BTreeMap<usize, GrammarRole>,
    word_count: usize,
) -> (Vec<usize>, Vec<usize>) {
    let mut kept = Vec::new();
    let mut dropped = Vec::new();

    let candidates = value.and_then(Value::as_array).into_iter().flatten();
    for index in candidates.filter_map(Value::as_u64).map(|i| i as usize) {
        let valid = index < word_count && roles.get(&index).is_some_and(GrammarRole::is_skeleton);
        if !valid {
            dropped.push(index);
        } else if !kept.contains(&index) {
            kept.push(index);
        }
    }
    (kept, dropped)
}
