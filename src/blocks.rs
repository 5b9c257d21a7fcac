use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub name: String,
    pub block: Option<String>,
    pub shadow: Option<String>,
}

impl Input {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            block: None,
            shadow: None,
        }
    }

    /// True when a real block sits on top of the shadow.
    pub fn is_obscured(&self) -> bool {
        match (&self.block, &self.shadow) {
            (Some(block), Some(shadow)) => block != shadow,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: Value,
    pub id: Option<String>,
    pub variable_type: Option<String>,
}

impl Field {
    pub fn new(name: &str, value: Value) -> Self {
        Self {
            name: name.to_string(),
            value,
            id: None,
            variable_type: None,
        }
    }
}

/// Legacy-compatibility payload; the engine reinterprets it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mutation {
    #[serde(rename = "tagName")]
    pub tag_name: String,
    pub children: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proccode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argumentids: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argumentnames: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argumentdefaults: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hasnext: Option<String>,
}

impl Default for Mutation {
    fn default() -> Self {
        Self {
            tag_name: "mutation".to_string(),
            children: Vec::new(),
            proccode: None,
            argumentids: None,
            argumentnames: None,
            argumentdefaults: None,
            warp: None,
            hasnext: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalBlock {
    pub id: String,
    pub opcode: String,
    pub inputs: IndexMap<String, Input>,
    pub fields: IndexMap<String, Field>,
    pub next: Option<String>,
    pub parent: Option<String>,
    pub shadow: bool,
    pub top_level: bool,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub mutation: Option<Mutation>,
}

impl CanonicalBlock {
    pub fn new(id: String, opcode: &str) -> Self {
        Self {
            id,
            opcode: opcode.to_string(),
            inputs: IndexMap::new(),
            fields: IndexMap::new(),
            next: None,
            parent: None,
            shadow: false,
            top_level: false,
            x: None,
            y: None,
            mutation: None,
        }
    }

    pub fn field_value(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).map(|field| &field.value)
    }
}

/// Block store of one target. Insertion keeps document order and ignores
/// ids that are already present.
#[derive(Debug, Clone, Default)]
pub struct Blocks {
    blocks: IndexMap<String, CanonicalBlock>,
    scripts: Vec<String>,
}

impl Blocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_block(&mut self, block: CanonicalBlock) {
        if self.blocks.contains_key(&block.id) {
            return;
        }
        if block.top_level {
            self.scripts.push(block.id.clone());
        }
        self.blocks.insert(block.id.clone(), block);
    }

    pub fn get(&self, id: &str) -> Option<&CanonicalBlock> {
        self.blocks.get(id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalBlock> {
        self.blocks.values()
    }

    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    /// Returns false when the block or field is not stored here.
    pub fn set_field_value(&mut self, block_id: &str, field_name: &str, value: Value) -> bool {
        match self
            .blocks
            .get_mut(block_id)
            .and_then(|block| block.fields.get_mut(field_name))
        {
            Some(field) => {
                field.value = value;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct IdGenerator {
    counter: usize,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}_{}", prefix, self.counter)
    }

    pub fn new_block_id(&mut self) -> String {
        self.new_id("block")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insertion_is_idempotent_and_ordered() {
        let mut blocks = Blocks::new();
        let mut hat = CanonicalBlock::new("a".to_string(), "event_whenflagclicked");
        hat.top_level = true;
        blocks.create_block(hat);
        blocks.create_block(CanonicalBlock::new("b".to_string(), "motion_movesteps"));
        blocks.create_block(CanonicalBlock::new("a".to_string(), "looks_show"));
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks.get("a").unwrap().opcode, "event_whenflagclicked");
        assert_eq!(blocks.scripts().to_vec(), vec!["a".to_string()]);
        let order = blocks.iter().map(|b| b.id.as_str()).collect::<Vec<_>>();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn rewrites_existing_fields_only() {
        let mut blocks = Blocks::new();
        let mut block = CanonicalBlock::new("a".to_string(), "event_broadcast_menu");
        block
            .fields
            .insert("BROADCAST_OPTION".to_string(), Field::new("BROADCAST_OPTION", json!("")));
        blocks.create_block(block);
        assert!(blocks.set_field_value("a", "BROADCAST_OPTION", json!("message1")));
        assert!(!blocks.set_field_value("a", "TEXT", json!("x")));
        assert!(!blocks.set_field_value("zz", "BROADCAST_OPTION", json!("x")));
        assert_eq!(
            blocks.get("a").unwrap().field_value("BROADCAST_OPTION"),
            Some(&json!("message1"))
        );
    }

    #[test]
    fn ids_are_sequential() {
        let mut ids = IdGenerator::new();
        assert_eq!(ids.new_block_id(), "block_1");
        assert_eq!(ids.new_id("target"), "target_2");
    }
}
