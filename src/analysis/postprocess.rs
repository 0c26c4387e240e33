//! Rule-based repair of prepositional-phrase role attribution.
//!
//! Phrase detection is a positional heuristic over the token and role arrays,
//! not a parse. A phrase starts at a preposition and runs until sentence-ending
//! punctuation, another preposition, a skeleton or clause token, or a comma
//! past the phrase's second token.

use crate::analysis::types::{GrammarRole, SentenceAnalysis};
use serde::Serialize;
use std::collections::BTreeMap;

const PREPOSITIONS: &[&str] = &[
    "to", "from", "in", "on", "at", "by", "for", "with", "about", "against", "into", "onto",
    "upon", "within", "without", "through", "during", "before", "after", "above", "below",
    "under", "over", "across", "around", "behind", "beside", "between", "among", "beyond", "near",
    "off", "out", "up", "down", "along", "toward", "towards", "via", "per", "except", "including",
    "concerning",
];

const SENTENCE_END: &[&str] = &[".", "!", "?"];

pub fn is_preposition(word: &str) -> bool {
    let lower = word.to_lowercase();
    PREPOSITIONS.contains(&lower.as_str())
}

/// Inclusive token span `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhraseSpan {
    pub start: usize,
    pub end: usize,
}

impl PhraseSpan {
    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

fn has_role(roles: &BTreeMap<usize, GrammarRole>, index: usize, pred: fn(&GrammarRole) -> bool) -> bool {
    roles.get(&index).is_some_and(pred)
}

pub fn find_prepositional_phrases(
    words: &[String],
    roles: &BTreeMap<usize, GrammarRole>,
) -> Vec<PhraseSpan> {
    let mut phrases = Vec::new();

    for (start, word) in words.iter().enumerate() {
        if has_role(roles, start, GrammarRole::is_clause) || !is_preposition(word) {
            continue;
        }

        let mut end = start + 1;
        while end < words.len() {
            let next = words[end].as_str();
            let boundary = SENTENCE_END.contains(&next)
                || is_preposition(next)
                || has_role(roles, end, GrammarRole::is_skeleton)
                || has_role(roles, end, GrammarRole::is_clause)
                || (next == "," && end > start + 2);
            if boundary {
                break;
            }
            end += 1;
        }

        if end > start + 1 {
            phrases.push(PhraseSpan {
                start,
                end: end - 1,
            });
        }
    }

    phrases
}

fn first_with_role(
    roles: &BTreeMap<usize, GrammarRole>,
    skeleton_indices: &[usize],
    role: GrammarRole,
) -> Option<usize> {
    skeleton_indices
        .iter()
        .copied()
        .find(|i| roles.get(i) == Some(&role))
}

/// Decide whether a phrase modifies the verb side (adverbial) or a noun (attribute).
pub fn determine_phrase_function(
    span: PhraseSpan,
    words: &[String],
    roles: &BTreeMap<usize, GrammarRole>,
    skeleton_indices: &[usize],
) -> GrammarRole {
    let PhraseSpan { start, end } = span;
    let predicate = first_with_role(roles, skeleton_indices, GrammarRole::Predicate);
    let object = first_with_role(roles, skeleton_indices, GrammarRole::Object);
    let subject = first_with_role(roles, skeleton_indices, GrammarRole::Subject);

    if let Some(pred) = predicate
        && start > pred
    {
        match object {
            Some(obj) if start > obj => return GrammarRole::Adverbial,
            None => return GrammarRole::Adverbial,
            Some(obj) if end < obj => return GrammarRole::Adverbial,
            Some(_) => {}
        }
    }

    if let Some(subj) = subject
        && start == subj + 1
    {
        let gap = words.get(subj + 1..start).unwrap_or_default();
        if !gap.iter().any(|w| w == ",") {
            return GrammarRole::Attribute;
        }
    }

    if let Some(obj) = object
        && start == obj + 1
    {
        return GrammarRole::Attribute;
    }

    GrammarRole::Adverbial
}

/// A single role rewrite performed by [`post_process_roles`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleChange {
    pub index: usize,
    pub word: String,
    pub before: GrammarRole,
    pub after: GrammarRole,
}

/// Modifier roles of the phrase, i.e. everything except connective and clause roles.
fn modifier_roles(
    roles: &BTreeMap<usize, GrammarRole>,
    span: PhraseSpan,
) -> BTreeMap<usize, GrammarRole> {
    span.indices()
        .filter_map(|i| roles.get(&i).map(|r| (i, r)))
        .filter(|(_, r)| !r.is_connective() && !r.is_clause())
        .map(|(i, r)| (i, r.clone()))
        .collect()
}

/// Make every prepositional phrase carry one modifier role.
///
/// A phrase is rewritten when its modifier roles mix adverbial and attribute,
/// or when none of them is either. Phrases inside a clause or containing a
/// skeleton token are left alone. Applying this twice is the same as once.
pub fn post_process_roles(analysis: &mut SentenceAnalysis) -> Vec<RoleChange> {
    let phrases = find_prepositional_phrases(&analysis.words, &analysis.word_roles);
    let mut changes = Vec::new();

    for span in phrases {
        let roles = &analysis.word_roles;
        if span.indices().any(|i| has_role(roles, i, GrammarRole::is_clause)) {
            continue;
        }

        let target = determine_phrase_function(span, &analysis.words, roles, &analysis.skeleton_indices);
        let current = modifier_roles(roles, span);
        let has_adverbial = current.values().any(|r| *r == GrammarRole::Adverbial);
        let has_attribute = current.values().any(|r| *r == GrammarRole::Attribute);
        let mixed = has_adverbial && has_attribute;
        let unassigned = !has_adverbial && !has_attribute && !current.is_empty();
        let has_skeleton = span.indices().any(|i| has_role(roles, i, GrammarRole::is_skeleton));

        if !(mixed || unassigned) || has_skeleton {
            continue;
        }

        for (index, before) in current {
            if before == target {
                continue;
            }
            analysis.word_roles.insert(index, target.clone());
            changes.push(RoleChange {
                index,
                word: analysis.words[index].clone(),
                before,
                after: target.clone(),
            });
        }
    }

    changes
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub phrase_range: (usize, usize),
    pub expected_role: GrammarRole,
    pub actual_roles: BTreeMap<usize, GrammarRole>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
}

/// Read-only check that reports phrases still mixing adverbial and attribute.
pub fn validate_prepositional_phrases(analysis: &SentenceAnalysis) -> ValidationReport {
    let roles = &analysis.word_roles;
    let mut issues = Vec::new();

    for span in find_prepositional_phrases(&analysis.words, roles) {
        let actual = modifier_roles(roles, span);
        let mixed = actual.values().any(|r| *r == GrammarRole::Adverbial)
            && actual.values().any(|r| *r == GrammarRole::Attribute);
        if !mixed {
            continue;
        }

        let expected =
            determine_phrase_function(span, &analysis.words, roles, &analysis.skeleton_indices);
        let text = analysis.words[span.indices()].join(" ");
        issues.push(ValidationIssue {
            kind: "inconsistent_prepositional_phrase",
            phrase_range: (span.start, span.end),
            message: format!(
                "Prepositional phrase \"{}\" has mixed roles. Expected all words to be \"{}\".",
                text, expected
            ),
            expected_role: expected,
            actual_roles: actual,
        });
    }

    ValidationReport {
        is_valid: issues.is_empty(),
        issues,
    }
}
