use serde::{Deserialize, Serialize};

/// Settings of one editing replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Identifies this replica in change sets and decides ties
    #[serde(default = "default_actor_id")]
    pub actor_id: String,

    /// Maximum number of undo steps kept (0 = unlimited)
    #[serde(default = "default_max_undo_levels")]
    pub max_undo_levels: usize,

    #[serde(default)]
    pub tie_break: TieBreak,

    /// Roots created for a fresh document
    #[serde(default = "default_roots")]
    pub roots: Vec<String>,
}

fn default_actor_id() -> String {
    "local".to_string()
}

fn default_max_undo_levels() -> usize {
    100
}

fn default_roots() -> Vec<String> {
    vec!["main".to_string()]
}

/// Which of two actors wins when concurrent changes collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TieBreak {
    #[default]
    LowerActorWins,
    HigherActorWins,
}

impl TieBreak {
    /// Whether changes of `local` beat concurrent changes of `remote`.
    pub fn local_is_strong(self, local: &str, remote: &str) -> bool {
        match self {
            TieBreak::LowerActorWins => local < remote,
            TieBreak::HigherActorWins => local > remote,
        }
    }
}

impl SessionConfig {
    pub fn with_actor(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            actor_id: default_actor_id(),
            max_undo_levels: default_max_undo_levels(),
            tie_break: TieBreak::default(),
            roots: default_roots(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "actorId": "alice",
            "maxUndoLevels": 5,
            "tieBreak": "higherActorWins",
            "roots": ["main", "title"]
        }"#;

        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.actor_id, "alice");
        assert_eq!(config.max_undo_levels, 5);
        assert_eq!(config.tie_break, TieBreak::HigherActorWins);
        assert_eq!(config.roots, vec!["main", "title"]);
    }

    #[test]
    fn test_default_config() {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.max_undo_levels, 100);
        assert_eq!(config.roots, vec!["main"]);
    }

    #[test]
    fn test_tie_break() {
        assert!(TieBreak::LowerActorWins.local_is_strong("alice", "bob"));
        assert!(!TieBreak::LowerActorWins.local_is_strong("bob", "alice"));
        assert!(TieBreak::HigherActorWins.local_is_strong("bob", "alice"));
    }
}
