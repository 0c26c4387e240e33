use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Grammatical role assigned to a single token.
///
/// Serialized as the Chinese label the game UI displays. Labels outside the
/// closed set survive a round trip as [`GrammarRole::Unrecognized`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GrammarRole {
    Subject,
    Predicate,
    Object,
    Predicative,
    Attribute,
    Adverbial,
    Complement,
    LinkVerb,
    Connective,
    AttributiveClause,
    AdverbialClause,
    Unrecognized(String),
}

impl GrammarRole {
    pub const ALL: [GrammarRole; 11] = [
        GrammarRole::Subject,
        GrammarRole::Predicate,
        GrammarRole::Object,
        GrammarRole::Predicative,
        GrammarRole::Attribute,
        GrammarRole::Adverbial,
        GrammarRole::Complement,
        GrammarRole::LinkVerb,
        GrammarRole::Connective,
        GrammarRole::AttributiveClause,
        GrammarRole::AdverbialClause,
    ];

    pub fn label(&self) -> &str {
        match self {
            GrammarRole::Subject => "主语",
            GrammarRole::Predicate => "谓语",
            GrammarRole::Object => "宾语",
            GrammarRole::Predicative => "表语",
            GrammarRole::Attribute => "定语",
            GrammarRole::Adverbial => "状语",
            GrammarRole::Complement => "补语",
            GrammarRole::LinkVerb => "系动词",
            GrammarRole::Connective => "连接词/其他",
            GrammarRole::AttributiveClause => "定语从句",
            GrammarRole::AdverbialClause => "状语从句",
            GrammarRole::Unrecognized(label) => label,
        }
    }

    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.label() == trimmed)
            .unwrap_or_else(|| GrammarRole::Unrecognized(label.to_string()))
    }

    /// Head-word roles of the main clause
    pub fn is_skeleton(&self) -> bool {
        matches!(
            self,
            GrammarRole::Subject
                | GrammarRole::Predicate
                | GrammarRole::Object
                | GrammarRole::Predicative
                | GrammarRole::Complement
                | GrammarRole::LinkVerb
        )
    }

    /// Roles that mark every token of an embedded clause
    pub fn is_clause(&self) -> bool {
        matches!(
            self,
            GrammarRole::AttributiveClause | GrammarRole::AdverbialClause
        )
    }

    pub fn is_connective(&self) -> bool {
        matches!(self, GrammarRole::Connective)
    }
}

impl From<String> for GrammarRole {
    fn from(label: String) -> Self {
        GrammarRole::from_label(&label)
    }
}

impl From<GrammarRole> for String {
    fn from(role: GrammarRole) -> Self {
        match role {
            GrammarRole::Unrecognized(label) => label,
            other => other.label().to_string(),
        }
    }
}

impl fmt::Display for GrammarRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Main-clause pattern of a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SentenceStructure {
    SV,
    #[default]
    SVO,
    SP,
    SVOO,
    SVOC,
}

impl SentenceStructure {
    pub const ALL: [SentenceStructure; 5] = [
        SentenceStructure::SV,
        SentenceStructure::SVO,
        SentenceStructure::SP,
        SentenceStructure::SVOO,
        SentenceStructure::SVOC,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SentenceStructure::SV => "主谓 (SV)",
            SentenceStructure::SVO => "主谓宾 (SVO)",
            SentenceStructure::SP => "主系表 (SP)",
            SentenceStructure::SVOO => "主谓双宾 (SVOO)",
            SentenceStructure::SVOC => "主谓宾宾补 (SVOC)",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SentenceStructure::SV => "SV",
            SentenceStructure::SVO => "SVO",
            SentenceStructure::SP => "SP",
            SentenceStructure::SVOO => "SVOO",
            SentenceStructure::SVOC => "SVOC",
        }
    }

    /// Accepts the full label (`主谓宾 (SVO)`) or the bare code (`SVO`).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.label() == value || s.code().eq_ignore_ascii_case(value))
    }
}

impl TryFrom<String> for SentenceStructure {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown sentence structure '{}'", value))
    }
}

impl From<SentenceStructure> for String {
    fn from(structure: SentenceStructure) -> Self {
        structure.label().to_string()
    }
}

impl fmt::Display for SentenceStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Requested difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DifficultyLevel {
    Basic,
    Intermediate,
    /// Bank entries that predate levels are treated as advanced
    #[default]
    Advanced,
}

impl DifficultyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyLevel::Basic => "Basic",
            DifficultyLevel::Intermediate => "Intermediate",
            DifficultyLevel::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifficultyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(DifficultyLevel::Basic),
            "intermediate" => Ok(DifficultyLevel::Intermediate),
            "advanced" => Ok(DifficultyLevel::Advanced),
            other => Err(format!(
                "unknown level '{}', expected basic, intermediate or advanced",
                other
            )),
        }
    }
}

/// Canonical sentence-analysis artifact handed to the game and the bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceAnalysis {
    pub original_sentence: String,
    pub words: Vec<String>,
    /// Explicit index to role mapping; every key is `< words.len()`
    pub word_roles: BTreeMap<usize, GrammarRole>,
    #[serde(default)]
    pub structure_type: SentenceStructure,
    #[serde(default)]
    pub skeleton_indices: Vec<usize>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<DifficultyLevel>,
}

impl SentenceAnalysis {
    pub fn role_at(&self, index: usize) -> Option<&GrammarRole> {
        self.word_roles.get(&index)
    }

    /// Level used when filtering bank entries
    pub fn effective_level(&self) -> DifficultyLevel {
        self.level.unwrap_or_default()
    }
}
