//! User-defined rules: conditions matched against a document and the
//! actions applied when they match.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMode {
    MatchAll,
    MatchAny,
}

impl RuleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MatchAll => "match_all",
            Self::MatchAny => "match_any",
        }
    }
}

impl FromStr for RuleMode {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "match_all" => Ok(Self::MatchAll),
            "match_any" => Ok(Self::MatchAny),
            other => Err(DatabaseError::InvalidCode {
                kind: "rule mode",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    NameIs,
    NameStarts,
    NameContains,
    DescriptionIs,
    DescriptionStarts,
    DescriptionContains,
    ContentIs,
    ContentStarts,
    ContentContains,
    MetadataHasKey,
    MetadataHasKeyValue,
    MetadataCount,
    MetadataCountLessThan,
    MetadataCountMoreThan,
}

impl ConditionKind {
    pub const ALL: [ConditionKind; 14] = [
        Self::NameIs,
        Self::NameStarts,
        Self::NameContains,
        Self::DescriptionIs,
        Self::DescriptionStarts,
        Self::DescriptionContains,
        Self::ContentIs,
        Self::ContentStarts,
        Self::ContentContains,
        Self::MetadataHasKey,
        Self::MetadataHasKeyValue,
        Self::MetadataCount,
        Self::MetadataCountLessThan,
        Self::MetadataCountMoreThan,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NameIs => "name_is",
            Self::NameStarts => "name_starts",
            Self::NameContains => "name_contains",
            Self::DescriptionIs => "description_is",
            Self::DescriptionStarts => "description_starts",
            Self::DescriptionContains => "description_contains",
            Self::ContentIs => "content_is",
            Self::ContentStarts => "content_starts",
            Self::ContentContains => "content_contains",
            Self::MetadataHasKey => "metadata_has_key",
            Self::MetadataHasKeyValue => "metadata_has_key_value",
            Self::MetadataCount => "metadata_count",
            Self::MetadataCountLessThan => "metadata_count_less_than",
            Self::MetadataCountMoreThan => "metadata_count_more_than",
        }
    }
}

impl FromStr for ConditionKind {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DatabaseError::InvalidCode {
                kind: "condition type",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SetName,
    AppendName,
    AddMetadata,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetName => "set_name",
            Self::AppendName => "append_name",
            Self::AddMetadata => "add_metadata",
        }
    }
}

impl FromStr for ActionKind {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set_name" => Ok(Self::SetName),
            "append_name" => Ok(Self::AppendName),
            "add_metadata" => Ok(Self::AddMetadata),
            other => Err(DatabaseError::InvalidCode {
                kind: "action type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub id: i64,
    pub kind: ConditionKind,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub metadata_key: i64,
    #[serde(default)]
    pub metadata_value: i64,
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub inverted: bool,
}

impl RuleCondition {
    /// Text condition with default flags.
    pub fn text(id: i64, kind: ConditionKind, value: &str) -> Self {
        Self {
            id,
            kind,
            value: value.to_string(),
            metadata_key: 0,
            metadata_value: 0,
            case_insensitive: false,
            inverted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
    pub id: i64,
    pub kind: ActionKind,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub metadata_key: i64,
    #[serde(default)]
    pub metadata_value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub mode: RuleMode,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

fn default_enabled() -> bool {
    true
}
