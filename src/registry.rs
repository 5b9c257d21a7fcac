use indexmap::IndexMap;
use log::debug;
use rand::Rng;
use std::collections::HashMap;

const BROADCAST_ID_PREFIX: &str = "broadcastMsgId-";
const FRESH_MESSAGE_PREFIX: &str = "message";
const PLACEHOLDER_SOUP: &[u8] =
    b"!#%()*+,-./:;=?@[]^_`{|}~ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableScope {
    pub id: String,
    pub is_root: bool,
}

impl VariableScope {
    pub fn new(id: &str, is_root: bool) -> Self {
        Self {
            id: id.to_string(),
            is_root,
        }
    }
}

/// Maps variable and list names to ids. Names resolved at root scope are
/// remembered and win over local ids in every nested scope.
#[derive(Debug, Default)]
pub struct VariableIdRegistry {
    root_ids: HashMap<String, String>,
}

impl VariableIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.root_ids.clear();
    }

    pub fn resolve(&mut self, scope: &VariableScope, name: &str) -> String {
        if scope.is_root {
            let id = scoped_id(&scope.id, name);
            self.root_ids.insert(name.to_string(), id.clone());
            return id;
        }
        match self.root_ids.get(name) {
            Some(id) => id.clone(),
            None => scoped_id(&scope.id, name),
        }
    }
}

fn scoped_id(scope_id: &str, name: &str) -> String {
    format!("{}-{}", scope_id, name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEntry {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLocation {
    pub block_id: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderResolution {
    pub name: String,
    pub fields: Vec<FieldLocation>,
}

/// Case-insensitive broadcast names shared by the whole document. Entries are
/// named by their folded key.
#[derive(Debug)]
pub struct BroadcastRegistry {
    entries: IndexMap<String, BroadcastEntry>,
    placeholder_key: String,
    deferred: Vec<FieldLocation>,
}

impl Default for BroadcastRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self::with_placeholder_key(random_key(20))
    }

    pub fn with_placeholder_key(placeholder_key: String) -> Self {
        Self {
            entries: IndexMap::new(),
            placeholder_key,
            deferred: Vec::new(),
        }
    }

    pub fn register(&mut self, name: &str) -> String {
        let key = if name.is_empty() {
            self.placeholder_key.clone()
        } else {
            name.to_lowercase()
        };
        if let Some(entry) = self.entries.get(&key) {
            return entry.id.clone();
        }
        let id = format!("{}{}", BROADCAST_ID_PREFIX, key);
        let entry_name = if name.is_empty() { String::new() } else { key.clone() };
        self.entries.insert(
            key,
            BroadcastEntry {
                id: id.clone(),
                name: entry_name,
            },
        );
        id
    }

    /// Registers the value of a field, remembering the field when the value is
    /// empty so finalization can give it a real name.
    pub fn register_field(&mut self, name: &str, block_id: &str, field: &str) -> String {
        let id = self.register(name);
        if name.is_empty() {
            self.deferred.push(FieldLocation {
                block_id: block_id.to_string(),
                field: field.to_string(),
            });
        }
        id
    }

    pub fn deferred_fields(&self) -> &[FieldLocation] {
        &self.deferred
    }

    /// Moves the placeholder entry under the lowest unused `messageN` name.
    /// Must only run after the whole document has been decoded.
    pub fn finalize(&mut self) -> Option<PlaceholderResolution> {
        let mut entry = self.entries.shift_remove(&self.placeholder_key)?;
        let mut suffix = 1usize;
        let mut name = format!("{}{}", FRESH_MESSAGE_PREFIX, suffix);
        while self.entries.contains_key(&name) {
            suffix += 1;
            name = format!("{}{}", FRESH_MESSAGE_PREFIX, suffix);
        }
        debug!("Naming empty broadcast '{}' ({})", name, entry.id);
        entry.name = name.clone();
        self.entries.insert(name.clone(), entry);
        Some(PlaceholderResolution {
            name,
            fields: self.deferred.clone(),
        })
    }

    pub fn messages(&self) -> impl Iterator<Item = &BroadcastEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn random_key(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| PLACEHOLDER_SOUP[rng.gen_range(0..PLACEHOLDER_SOUP.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_variables_are_inherited() {
        let mut registry = VariableIdRegistry::new();
        registry.reset();
        let stage = VariableScope::new("stage", true);
        let cat = VariableScope::new("cat", false);
        let dog = VariableScope::new("dog", false);

        assert_eq!(registry.resolve(&stage, "score"), "stage-score");
        assert_eq!(registry.resolve(&cat, "score"), "stage-score");
        assert_eq!(registry.resolve(&cat, "counter"), "cat-counter");
        assert_eq!(registry.resolve(&dog, "counter"), "dog-counter");
    }

    #[test]
    fn reset_forgets_root_names() {
        let mut registry = VariableIdRegistry::new();
        registry.resolve(&VariableScope::new("old", true), "score");
        registry.reset();
        assert_eq!(
            registry.resolve(&VariableScope::new("cat", false), "score"),
            "cat-score"
        );
    }

    #[test]
    fn broadcast_names_are_case_insensitive() {
        let mut registry = BroadcastRegistry::new();
        let first = registry.register("Go");
        assert_eq!(first, "broadcastMsgId-go");
        assert_eq!(registry.register("GO"), first);
        assert_eq!(registry.register("go"), first);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.messages().next().unwrap().name, "go");
    }

    #[test]
    fn empty_name_resolves_to_message1() {
        let mut registry = BroadcastRegistry::with_placeholder_key("$$".to_string());
        let a = registry.register_field("", "b1", "BROADCAST_OPTION");
        let b = registry.register_field("", "b2", "BROADCAST_OPTION");
        registry.register_field("start", "b3", "BROADCAST_OPTION");
        assert_eq!(a, b);
        assert_eq!(registry.deferred_fields().len(), 2);

        let resolution = registry.finalize().unwrap();
        assert_eq!(resolution.name, "message1");
        assert_eq!(
            resolution.fields.iter().map(|f| f.block_id.as_str()).collect::<Vec<_>>(),
            vec!["b1", "b2"]
        );
        let entries = registry.messages().collect::<Vec<_>>();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.id == a && e.name == "message1"));
        assert!(entries.iter().all(|e| e.name != "$$"));
    }

    #[test]
    fn taken_fresh_names_are_skipped() {
        let mut registry = BroadcastRegistry::new();
        registry.register("Message1");
        registry.register("");
        let resolution = registry.finalize().unwrap();
        assert_eq!(resolution.name, "message2");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn finalize_without_placeholder_is_a_no_op() {
        let mut registry = BroadcastRegistry::new();
        registry.register("only");
        assert!(registry.finalize().is_none());
        assert_eq!(registry.len(), 1);
    }
}
