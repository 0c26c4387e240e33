use crate::analysis::types::{DifficultyLevel, GrammarRole, SentenceAnalysis, SentenceStructure};
use std::collections::BTreeMap;

/// Canned artifact served when every provider failed during level-based generation.
pub fn sample_analysis(level: DifficultyLevel) -> SentenceAnalysis {
    let words = [
        "The", "student", "finished", "the", "essay", "that", "was", "written", "on", "the",
        "desk", ".",
    ];

    let mut word_roles = BTreeMap::from([
        (0, GrammarRole::Attribute),
        (1, GrammarRole::Subject),
        (2, GrammarRole::Predicate),
        (3, GrammarRole::Attribute),
        (4, GrammarRole::Object),
        (11, GrammarRole::Connective),
    ]);
    word_roles.extend((5..=10).map(|i| (i, GrammarRole::AttributiveClause)));

    let options = [
        GrammarRole::Subject,
        GrammarRole::Predicate,
        GrammarRole::Object,
        GrammarRole::Attribute,
        GrammarRole::Adverbial,
        GrammarRole::AttributiveClause,
        GrammarRole::Connective,
    ];

    SentenceAnalysis {
        original_sentence: "The student finished the essay that was written on the desk.".to_string(),
        words: words.iter().map(|w| w.to_string()).collect(),
        word_roles,
        structure_type: SentenceStructure::SVO,
        skeleton_indices: vec![1, 2, 4],
        explanation: "主干是: student (主语) finished (谓语) essay (宾语)。'that was written on the desk' 是定语从句，修饰 essay。".to_string(),
        options: options.iter().map(|r| r.label().to_string()).collect(),
        level: Some(level),
    }
}
