use crate::analysis::types::{DifficultyLevel, GrammarRole, SentenceStructure};
use serde_json::{Value, json};

/// Builds the prompt text and output schema sent to providers.
pub trait PromptBuilder: Send + Sync {
    fn build_prompt(&self, level: DifficultyLevel, previous_sentence: Option<&str>) -> String;

    fn build_analysis_prompt(&self, sentence: &str, level: DifficultyLevel) -> String;

    /// JSON schema of the expected artifact
    fn schema(&self) -> Value;

    fn system_prompt(&self) -> String;
}

pub const REQUIRED_FIELDS: [&str; 7] = [
    "originalSentence",
    "words",
    "wordRoles",
    "structureType",
    "skeletonIndices",
    "explanation",
    "options",
];

const BASIC_INSTRUCTION: &str = r#"Generate a SIMPLE English sentence suitable for Grade 7.
- It MUST be a simple sentence with ONE main clause.
- NO subordinate clauses (no 'which', 'that', 'because', etc.).
- NO complex modifiers. Keep adjectives and adverbs simple.
- Focus on clear S-V, S-V-O, S-V-P structures.
- Use DIVERSE topics: daily activities, nature, school, hobbies, food, travel, technology, sports, art.
- Avoid overused examples like "dog chases cat" or "fox jumps over dog".
- Good variety looks like: "My grandmother bakes delicious cookies." or "The chef prepared fresh ingredients.""#;

const INTERMEDIATE_INSTRUCTION: &str = r#"Generate an INTERMEDIATE English sentence suitable for Grade 8.
- It MUST contain RICH MODIFIERS (adjectives, adverbs, prepositional phrases).
- NO subordinate clauses (avoid 'which', 'who', 'although' clauses).
- The challenge is telling modifiers (attributes/adverbials) apart from the skeleton.
- Use DIVERSE topics and avoid repetitive examples.
- Example: "The very old man in the park walked slowly towards the bench.""#;

const ADVANCED_INSTRUCTION: &str = r#"Generate a COMPLEX English sentence suitable for Grade 9.
- The sentence MUST contain at least one SUBORDINATE CLAUSE (attributive/relative or adverbial).
- It should challenge the student to find the main skeleton amidst the clauses.
- Use DIVERSE topics: academic subjects, history, science, literature, current events, professional contexts.
- Example: "Although the project seemed difficult at first, the team completed it successfully.""#;

const ANALYSIS_RULES: &str = r#"Analyze the sentence structure focusing on "Skeleton vs. Modifiers vs. Clauses".

1. Split the sentence into individual words and punctuation (tokens).

2. Assign a grammatical role to EACH token:
   - Skeleton: mark the HEAD word of the Subject (主语), Predicate (谓语), Object (宾语),
     Predicative (表语), Complement (补语, including object complements in SVOC) and
     Link Verb (系动词). An appositive noun is marked '定语'.
   - Clauses: if a modifier is a complete clause, mark EVERY word of a relative clause
     as '定语从句' and EVERY word of an adverbial clause as '状语从句'. Never break down
     the inside of a clause, even when it contains phrases of its own. Clause roles only
     appear at the Advanced level.
   - Phrases: mark EVERY word of a non-clause modifier as '定语' when it modifies a noun
     and as '状语' when it modifies a verb, adjective or the sentence. A prepositional
     phrase takes ONE role for all its words, decided by what the whole phrase modifies:
     "He put the book on the table" gives 状语 to "on the table", while
     "the book on the table" gives 定语 to it. The same unit rule applies to participle,
     infinitive, adjective and adverb phrases, and to "and"/"or" joining words inside one.
   - Connective: use '连接词/其他' ONLY for punctuation and for conjunctions that join
     two main clauses.

3. Return 'wordRoles' as an ordered list of strings matching the 'words' list index by index.

4. Determine the main clause structure from: [主谓 (SV), 主谓宾 (SVO), 主系表 (SP), 主谓双宾 (SVOO), 主谓宾宾补 (SVOC)].

5. Give 'skeletonIndices': the indices of the head words of the main structure.

6. Write a brief 'explanation' in Chinese covering the skeleton and any clauses or modifiers.

7. Give 'options': unique role strings for UI buttons, all used roles plus 2-3 distractors.

Return the result in JSON format."#;

const SYSTEM_PROMPT: &str = r#"You are an English grammar teacher preparing sentence-skeleton exercises for Chinese middle-school students. You label every token with exactly one grammatical role using the fixed Chinese role labels, and you always answer with a single valid JSON object that matches the requested schema."#;

/// Built-in prompt set with one instruction block per difficulty level.
#[derive(Debug, Clone, Default)]
pub struct TemplatePromptBuilder;

impl TemplatePromptBuilder {
    pub fn new() -> Self {
        Self
    }

    fn level_instruction(level: DifficultyLevel) -> &'static str {
        match level {
            DifficultyLevel::Basic => BASIC_INSTRUCTION,
            DifficultyLevel::Intermediate => INTERMEDIATE_INSTRUCTION,
            DifficultyLevel::Advanced => ADVANCED_INSTRUCTION,
        }
    }
}

impl PromptBuilder for TemplatePromptBuilder {
    fn build_prompt(&self, level: DifficultyLevel, previous_sentence: Option<&str>) -> String {
        let mut prompt = String::new();
        prompt.push_str(Self::level_instruction(level));
        prompt.push_str("\n\n");

        if let Some(previous) = previous_sentence.map(str::trim).filter(|s| !s.is_empty()) {
            prompt.push_str(&format!(
                "The previous exercise used: \"{}\". Generate a DIFFERENT sentence with a different topic and structure.\n\n",
                previous
            ));
        }

        prompt.push_str("Then, ");
        prompt.push_str(ANALYSIS_RULES);
        prompt
    }

    fn build_analysis_prompt(&self, sentence: &str, level: DifficultyLevel) -> String {
        let mut prompt = String::new();
        prompt.push_str("Analyze the following English sentence exactly as written. Do not rewrite or correct it.\n\n");
        prompt.push_str(&format!("Sentence: \"{}\"\n", sentence.trim()));
        prompt.push_str(&format!("Student level: {}\n\n", level));
        if level != DifficultyLevel::Advanced {
            prompt.push_str("If the sentence nevertheless contains clauses, mark them with the clause roles.\n\n");
        }
        prompt.push_str(ANALYSIS_RULES);
        prompt
    }

    fn schema(&self) -> Value {
        let roles = GrammarRole::ALL;
        let role_labels: Vec<&str> = roles.iter().map(GrammarRole::label).collect();
        let structures: Vec<&str> = SentenceStructure::ALL.iter().map(|s| s.label()).collect();

        json!({
            "type": "object",
            "properties": {
                "originalSentence": {
                    "type": "string",
                    "description": "The original English sentence to analyze"
                },
                "words": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Array of words/punctuation tokens from the sentence"
                },
                "wordRoles": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": format!(
                        "Array of grammatical roles corresponding index-by-index to the words array. Each element should be one of: {}",
                        role_labels.join(", ")
                    )
                },
                "structureType": {
                    "type": "string",
                    "enum": structures,
                    "description": "The main sentence structure type"
                },
                "skeletonIndices": {
                    "type": "array",
                    "items": { "type": "integer" },
                    "description": "Indices of words that form the skeleton (main structure)"
                },
                "explanation": {
                    "type": "string",
                    "description": "Brief explanation in Chinese explaining the skeleton and modifiers/clauses"
                },
                "options": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "List of unique role strings for UI buttons, including all used roles plus 2-3 distractors"
                }
            },
            "required": REQUIRED_FIELDS,
        })
    }

    fn system_prompt(&self) -> String {
        SYSTEM_PROMPT.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_instructions_differ() {
        let builder = TemplatePromptBuilder::new();
        let basic = builder.build_prompt(DifficultyLevel::Basic, None);
        let advanced = builder.build_prompt(DifficultyLevel::Advanced, None);
        assert!(basic.contains("Grade 7"));
        assert!(advanced.contains("SUBORDINATE CLAUSE"));
        assert!(basic.contains("skeletonIndices"));
    }

    #[test]
    fn previous_sentence_is_mentioned_only_when_present() {
        let builder = TemplatePromptBuilder::new();
        let prompt = builder.build_prompt(DifficultyLevel::Intermediate, Some("Cats sleep."));
        assert!(prompt.contains("\"Cats sleep.\""));
        assert!(prompt.contains("DIFFERENT"));

        let prompt = builder.build_prompt(DifficultyLevel::Intermediate, Some("   "));
        assert!(!prompt.contains("previous exercise"));
    }

    #[test]
    fn analysis_prompt_quotes_sentence() {
        let builder = TemplatePromptBuilder::new();
        let prompt = builder.build_analysis_prompt("  I like tea. ", DifficultyLevel::Basic);
        assert!(prompt.contains("Sentence: \"I like tea.\""));
        assert!(prompt.contains("Student level: Basic"));
    }

    #[test]
    fn schema_requires_every_artifact_field() {
        let schema = TemplatePromptBuilder::new().schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, REQUIRED_FIELDS);
        assert_eq!(schema["properties"]["structureType"]["enum"][1], "主谓宾 (SVO)");
        let roles = schema["properties"]["wordRoles"]["description"].as_str().unwrap();
        assert!(roles.contains("连接词/其他"));
    }
}
