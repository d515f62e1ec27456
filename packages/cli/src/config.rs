use arbor_editor::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_NAME: &str = "arbor.config.json";

/// Arbor configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Settings of the local replica
    #[serde(default)]
    pub session: SessionConfig,

    /// Actor id of the simulated second replica in `converge`
    #[serde(default = "default_peer_actor")]
    pub peer_actor: String,
}

fn default_peer_actor() -> String {
    "peer".to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(Config::default())
        }
    }

    /// Session settings of the simulated peer
    pub fn peer_session(&self) -> SessionConfig {
        SessionConfig {
            actor_id: self.peer_actor.clone(),
            ..self.session.clone()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            peer_actor: default_peer_actor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_editor::TieBreak;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "session": { "actorId": "alice", "tieBreak": "higherActorWins" },
            "peerActor": "bob"
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.session.actor_id, "alice");
        assert_eq!(config.session.tie_break, TieBreak::HigherActorWins);
        assert_eq!(config.session.max_undo_levels, 100);
        assert_eq!(config.peer_actor, "bob");

        let peer = config.peer_session();
        assert_eq!(peer.actor_id, "bob");
        assert_eq!(peer.tie_break, TieBreak::HigherActorWins);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.actor_id, "local");
        assert_eq!(config.peer_actor, "peer");
        assert_eq!(config.session.roots, vec!["main"]);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = std::env::temp_dir().join("arbor-cli-config-missing");
        let config = Config::load(&dir.display().to_string()).unwrap();
        assert_eq!(config, Config::default());
    }
}
