//! Connection identities and the connection → display name roster

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier issued by the transport when a connection opens
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Active connections and the names their players chose
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    players: BTreeMap<ConnectionId, String>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or renames a player, returning the previous name if any
    pub fn insert(&mut self, id: ConnectionId, name: impl Into<String>) -> Option<String> {
        self.players.insert(id, name.into())
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<String> {
        self.players.remove(id)
    }

    pub fn name_of(&self, id: &ConnectionId) -> Option<&str> {
        self.players.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.players.contains_key(id)
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.players.keys().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.players.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConnectionId, &str)> {
        self.players.iter().map(|(id, name)| (id, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl FromIterator<(ConnectionId, String)> for Roster {
    fn from_iter<I: IntoIterator<Item = (ConnectionId, String)>>(iter: I) -> Self {
        Self {
            players: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_eq!(a.as_str().len(), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn test_insert_overwrites_name() {
        let mut roster = Roster::new();
        let id = ConnectionId::from("c1");

        assert_eq!(roster.insert(id.clone(), "Ann"), None);
        assert_eq!(roster.insert(id.clone(), "Bea"), Some("Ann".to_string()));
        assert_eq!(roster.name_of(&id), Some("Bea"));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_remove_missing_player() {
        let mut roster = Roster::new();
        assert_eq!(roster.remove(&ConnectionId::from("ghost")), None);
        assert!(roster.is_empty());
    }

    #[test]
    fn test_names_follow_connection_order() {
        let roster: Roster = vec![
            (ConnectionId::from("b"), "Bea".to_string()),
            (ConnectionId::from("a"), "Ann".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(roster.names(), vec!["Ann".to_string(), "Bea".to_string()]);
        assert_eq!(
            roster.connection_ids(),
            vec![ConnectionId::from("a"), ConnectionId::from("b")]
        );
    }
}
