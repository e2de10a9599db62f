//! Scope keys: the monitored units of a conversation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CdeError;

/// A monitored scope. Textual form is `global`, `agent:<id>`, `task:<id>`
/// or `scene:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScopeKey {
    Global,
    Agent(String),
    Task(String),
    Scene(String),
}

impl ScopeKey {
    /// Parse the textual form; unknown prefixes and empty ids are rejected
    pub fn parse(key: &str) -> Result<Self, CdeError> {
        if key == "global" {
            return Ok(Self::Global);
        }

        let (prefix, id) = key
            .split_once(':')
            .ok_or_else(|| CdeError::input_invalid(format!("malformed scope key '{}'", key)))?;

        if id.is_empty() {
            return Err(CdeError::input_invalid(format!("scope key '{}' has an empty id", key)));
        }

        match prefix {
            "agent" => Ok(Self::Agent(id.to_string())),
            "task" => Ok(Self::Task(id.to_string())),
            "scene" => Ok(Self::Scene(id.to_string())),
            _ => Err(CdeError::input_invalid(format!("unknown scope prefix '{}'", prefix))),
        }
    }

    /// Scope class; also the name of the override document for this scope
    pub fn class(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Agent(_) => "agent",
            Self::Task(_) => "task",
            Self::Scene(_) => "scene",
        }
    }

    /// Ranking used when one event must be surfaced for a turn
    pub fn priority(&self) -> u8 {
        match self {
            Self::Scene(_) => 4,
            Self::Task(_) => 3,
            Self::Agent(_) => 2,
            Self::Global => 1,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Agent(id) => write!(f, "agent:{}", id),
            Self::Task(id) => write!(f, "task:{}", id),
            Self::Scene(id) => write!(f, "scene:{}", id),
        }
    }
}

impl FromStr for ScopeKey {
    type Err = CdeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ScopeKey {
    type Error = CdeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ScopeKey> for String {
    fn from(key: ScopeKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_forms() {
        assert_eq!(ScopeKey::parse("global").unwrap(), ScopeKey::Global);
        assert_eq!(ScopeKey::parse("agent:npc1").unwrap(), ScopeKey::Agent("npc1".into()));
        assert_eq!(ScopeKey::parse("task:T1").unwrap(), ScopeKey::Task("T1".into()));
        assert_eq!(ScopeKey::parse("scene:S1").unwrap(), ScopeKey::Scene("S1".into()));
    }

    #[test]
    fn test_id_may_contain_colons() {
        let key = ScopeKey::parse("agent:ns:npc1").unwrap();
        assert_eq!(key, ScopeKey::Agent("ns:npc1".into()));
        assert_eq!(key.to_string(), "agent:ns:npc1");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["", "agent", "agent:", "room:1", "GLOBAL"] {
            let err = ScopeKey::parse(bad).unwrap_err();
            assert!(err.is_client_error(), "'{}' should be rejected as input", bad);
        }
    }

    #[test]
    fn test_priority_order() {
        let scene = ScopeKey::Scene("s".into());
        let task = ScopeKey::Task("t".into());
        let agent = ScopeKey::Agent("a".into());
        assert!(scene.priority() > task.priority());
        assert!(task.priority() > agent.priority());
        assert!(agent.priority() > ScopeKey::Global.priority());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&ScopeKey::Task("T1".into())).unwrap();
        assert_eq!(json, "\"task:T1\"");
        let back: ScopeKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ScopeKey::Task("T1".into()));
        assert!(serde_json::from_str::<ScopeKey>("\"bogus\"").is_err());
    }
}
