use crate::blocks::{CanonicalBlock, Field, IdGenerator, Input, Mutation};
use crate::color;
use crate::linker::decode_block_list;
use crate::registry::{BroadcastRegistry, VariableIdRegistry, VariableScope};
use crate::signature;
use crate::specmap::{ArgumentDescriptor, SpecMap, BROADCAST_MESSAGE_TYPE};
use indexmap::IndexSet;
use log::warn;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

const CALL_OPCODE: &str = "call";

const CORE_EXTENSIONS: &[&str] = &[
    "argument",
    "colour",
    "control",
    "data",
    "event",
    "looks",
    "math",
    "motion",
    "operator",
    "procedures",
    "sensing",
    "sound",
];

pub struct DecodeContext<'a> {
    pub spec_map: &'a SpecMap,
    pub ids: &'a mut IdGenerator,
    pub variables: &'a mut VariableIdRegistry,
    pub scope: &'a VariableScope,
    pub broadcasts: &'a mut BroadcastRegistry,
    pub extensions: &'a mut IndexSet<String>,
}

/// A decoded block together with the blocks it produced beneath itself, in
/// the order they were attached.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBlock {
    pub block: CanonicalBlock,
    pub children: Vec<DecodedBlock>,
}

impl DecodedBlock {
    pub fn leaf(block: CanonicalBlock) -> Self {
        Self {
            block,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LegacyArg<'a> {
    Missing,
    Literal(&'a Value),
    Block(&'a [Value]),
    Script(&'a [Value]),
}

impl<'a> LegacyArg<'a> {
    pub fn classify(value: Option<&'a Value>) -> Self {
        match value {
            None => LegacyArg::Missing,
            Some(Value::Array(items)) => match items.first() {
                Some(Value::Array(_)) | None => LegacyArg::Script(items),
                Some(_) => LegacyArg::Block(items),
            },
            Some(other) => LegacyArg::Literal(other),
        }
    }

    fn is_nested(&self) -> bool {
        matches!(self, LegacyArg::Block(_) | LegacyArg::Script(_))
    }

    fn text(&self) -> String {
        match self {
            LegacyArg::Literal(value) => literal_text(value),
            _ => String::new(),
        }
    }
}

pub fn literal_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn decode_block(record: &[Value], cx: &mut DecodeContext<'_>) -> Option<DecodedBlock> {
    let spec_map = cx.spec_map;
    let legacy_opcode = record.first().and_then(Value::as_str).unwrap_or_default();
    let Some(spec) = spec_map.get(legacy_opcode) else {
        warn!("Couldn't find legacy block '{}'; dropping it.", legacy_opcode);
        return None;
    };
    record_extension(&spec.opcode, cx.extensions);

    let call_arg_map;
    let arg_map = if legacy_opcode == CALL_OPCODE {
        let proccode = record.get(1).and_then(Value::as_str).unwrap_or_default();
        call_arg_map = signature::parse_arg_map(proccode);
        &call_arg_map
    } else {
        &spec.arg_map
    };

    let mut block = CanonicalBlock::new(cx.ids.new_block_id(), &spec.opcode);
    let mut children = Vec::new();
    for (index, descriptor) in arg_map.iter().enumerate() {
        let arg = LegacyArg::classify(record.get(index + 1));
        match descriptor {
            ArgumentDescriptor::Placeholder => {}
            ArgumentDescriptor::Field {
                name,
                variable_type,
            } => decode_field(&mut block, name, variable_type.as_deref(), arg, cx),
            ArgumentDescriptor::Input { name, shadow } => decode_input(
                &mut block,
                &mut children,
                name,
                shadow.as_deref(),
                arg,
                cx,
            ),
        }
    }

    if let Some(rule) = PostRule::for_opcode(legacy_opcode) {
        rule.apply(record, &mut block, &mut children, cx);
    }
    Some(DecodedBlock { block, children })
}

fn decode_field(
    block: &mut CanonicalBlock,
    name: &str,
    variable_type: Option<&str>,
    arg: LegacyArg<'_>,
    cx: &mut DecodeContext<'_>,
) {
    let text = arg.text();
    let value = match arg {
        LegacyArg::Literal(value) => value.clone(),
        _ => Value::String(String::new()),
    };
    let mut field = Field::new(name, value);
    match name {
        "VARIABLE" | "LIST" => {
            field.id = Some(cx.variables.resolve(cx.scope, &text));
        }
        "BROADCAST_OPTION" => {
            field.id = Some(cx.broadcasts.register_field(&text, &block.id, name));
        }
        "CURRENTMENU" => {
            let menu = if text == "day of week" {
                "DAYOFWEEK".to_string()
            } else {
                text.to_uppercase()
            };
            field.value = Value::String(menu);
        }
        _ => {}
    }
    if let Some(variable_type) = variable_type {
        field.variable_type = Some(variable_type.to_string());
    }
    block.fields.insert(name.to_string(), field);
}

fn decode_input(
    block: &mut CanonicalBlock,
    children: &mut Vec<DecodedBlock>,
    name: &str,
    shadow_kind: Option<&str>,
    arg: LegacyArg<'_>,
    cx: &mut DecodeContext<'_>,
) {
    let mut input = Input::new(name);
    let obscured = arg.is_nested();
    let mut nested: Vec<DecodedBlock> = match arg {
        LegacyArg::Block(record) => decode_block(record, cx).into_iter().collect(),
        LegacyArg::Script(records) => decode_block_list(records, cx),
        _ => Vec::new(),
    };
    if let Some(first) = nested.first_mut() {
        first.block.parent = Some(block.id.clone());
        input.block = Some(first.block.id.clone());
    }
    children.extend(nested);

    if let Some(kind) = shadow_kind {
        let shadow_id = cx.ids.new_block_id();
        let field = shadow_field(kind, name, arg, obscured, &shadow_id, cx);
        let mut shadow = CanonicalBlock::new(shadow_id.clone(), kind);
        shadow.shadow = true;
        shadow.parent = Some(block.id.clone());
        shadow.fields.insert(field.name.clone(), field);
        children.push(DecodedBlock::leaf(shadow));
        if input.block.is_none() {
            input.block = Some(shadow_id.clone());
        }
        input.shadow = Some(shadow_id);
    }
    block.inputs.insert(name.to_string(), input);
}

fn is_number_shadow(kind: &str) -> bool {
    matches!(
        kind,
        "math_number" | "math_whole_number" | "math_positive_number" | "math_integer" | "math_angle"
    )
}

/// Picks the field a synthesized shadow carries. A missing element is
/// treated like an obscured slot.
fn shadow_field(
    kind: &str,
    input_name: &str,
    arg: LegacyArg<'_>,
    obscured: bool,
    shadow_id: &str,
    cx: &mut DecodeContext<'_>,
) -> Field {
    let provided = match arg {
        LegacyArg::Literal(value) if !obscured => Some(value),
        _ => None,
    };
    if is_number_shadow(kind) {
        return Field::new("NUM", provided.cloned().unwrap_or_else(|| json!(10)));
    }
    match kind {
        "text" => Field::new("TEXT", provided.cloned().unwrap_or_else(|| json!(""))),
        "colour_picker" => {
            let hex = provided
                .map(color::value_to_hex)
                .unwrap_or_else(|| color::OBSCURED_COLOUR.to_string());
            Field::new("COLOUR", Value::String(hex))
        }
        "event_broadcast_menu" => {
            let mut field = Field::new("BROADCAST_OPTION", json!(""));
            field.variable_type = Some(BROADCAST_MESSAGE_TYPE.to_string());
            if let Some(value) = provided {
                let message = literal_text(value);
                field.id = Some(cx.broadcasts.register_field(&message, shadow_id, &field.name));
                field.value = Value::String(message);
            }
            field
        }
        _ => Field::new(input_name, provided.cloned().unwrap_or_else(|| json!(""))),
    }
}

fn extension_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w-]").expect("static pattern"))
}

fn record_extension(opcode: &str, extensions: &mut IndexSet<String>) {
    let Some((prefix, _)) = opcode.split_once('_') else {
        return;
    };
    let prefix = extension_prefix_re().replace_all(prefix, "-");
    if prefix.is_empty() || CORE_EXTENSIONS.contains(&prefix.as_ref()) {
        return;
    }
    extensions.insert(prefix.into_owned());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PostRule {
    FrontLayer,
    BackwardLayers,
    NumberNameMenu(&'static str),
    StopOtherScripts,
    ProcedureDefinition,
    ProcedureCall,
    ParameterShape,
}

impl PostRule {
    fn for_opcode(legacy_opcode: &str) -> Option<Self> {
        let rule = match legacy_opcode {
            "comeToFront" => PostRule::FrontLayer,
            "goBackByLayers:" => PostRule::BackwardLayers,
            "costumeIndex" | "backgroundIndex" => PostRule::NumberNameMenu("number"),
            "costumeName" | "sceneName" => PostRule::NumberNameMenu("name"),
            "stopScripts" => PostRule::StopOtherScripts,
            "procDef" => PostRule::ProcedureDefinition,
            CALL_OPCODE => PostRule::ProcedureCall,
            "getParam" => PostRule::ParameterShape,
            _ => return None,
        };
        Some(rule)
    }

    fn apply(
        self,
        record: &[Value],
        block: &mut CanonicalBlock,
        children: &mut Vec<DecodedBlock>,
        cx: &mut DecodeContext<'_>,
    ) {
        match self {
            PostRule::FrontLayer => set_menu_field(block, "FRONT_BACK", "front"),
            PostRule::BackwardLayers => set_menu_field(block, "FORWARD_BACKWARD", "backward"),
            PostRule::NumberNameMenu(choice) => set_menu_field(block, "NUMBER_NAME", choice),
            PostRule::StopOtherScripts => {
                let option = record.get(1).and_then(Value::as_str).unwrap_or_default();
                if option == "other scripts in sprite" || option == "other scripts in stage" {
                    block.mutation = Some(Mutation {
                        hasnext: Some("true".to_string()),
                        ..Mutation::default()
                    });
                }
            }
            PostRule::ProcedureDefinition => {
                let proccode = record.get(1).and_then(Value::as_str).unwrap_or_default();
                let prototype_id = cx.ids.new_block_id();
                let mut prototype = CanonicalBlock::new(prototype_id.clone(), "procedures_prototype");
                prototype.shadow = true;
                prototype.parent = Some(block.id.clone());
                prototype.mutation = Some(Mutation {
                    proccode: Some(proccode.to_string()),
                    argumentnames: Some(json_list(record.get(2))),
                    argumentids: Some(json!(signature::argument_ids(proccode)).to_string()),
                    argumentdefaults: Some(json_list(record.get(3))),
                    warp: Some(warp_flag(record.get(4))),
                    ..Mutation::default()
                });
                block.inputs.insert(
                    "custom_block".to_string(),
                    Input {
                        name: "custom_block".to_string(),
                        block: Some(prototype_id.clone()),
                        shadow: Some(prototype_id),
                    },
                );
                children.push(DecodedBlock::leaf(prototype));
            }
            PostRule::ProcedureCall => {
                let proccode = record.get(1).and_then(Value::as_str).unwrap_or_default();
                block.mutation = Some(Mutation {
                    proccode: Some(proccode.to_string()),
                    argumentids: Some(json!(signature::argument_ids(proccode)).to_string()),
                    ..Mutation::default()
                });
            }
            PostRule::ParameterShape => match record.get(2).and_then(Value::as_str) {
                Some("r") => block.opcode = "argument_reporter_string_number".to_string(),
                Some("b") => block.opcode = "argument_reporter_boolean".to_string(),
                _ => {}
            },
        }
    }
}

fn set_menu_field(block: &mut CanonicalBlock, name: &str, value: &str) {
    block
        .fields
        .insert(name.to_string(), Field::new(name, json!(value)));
}

fn json_list(value: Option<&Value>) -> String {
    match value {
        Some(list @ Value::Array(_)) => list.to_string(),
        _ => "[]".to_string(),
    }
}

fn warp_flag(value: Option<&Value>) -> String {
    match value {
        Some(Value::Bool(true)) => "true".to_string(),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => "true".to_string(),
        _ => "false".to_string(),
    }
}
