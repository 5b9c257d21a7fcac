use crate::assets::{AssetSource, Costume, Sound};
use crate::blocks::{Blocks, IdGenerator};
use crate::decode::DecodeContext;
use crate::linker::{decode_block_list, flatten};
use crate::project::ProjectObject;
use crate::registry::{BroadcastRegistry, VariableIdRegistry, VariableScope};
use crate::specmap::SpecMap;
use anyhow::Result;
use futures::future::{try_join_all, LocalBoxFuture};
use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use serde_json::Value;
use std::cell::RefCell;

/// Canonical blocks are drawn larger than legacy ones.
const WORKSPACE_SCALE_X: f64 = 1.5;
const WORKSPACE_SCALE_Y: f64 = 2.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Scalar,
    List,
    Broadcast,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub id: String,
    pub name: String,
    pub kind: VariableKind,
    pub value: Value,
    pub is_cloud: bool,
}

#[derive(Debug, Clone)]
pub struct Target {
    pub id: String,
    pub name: String,
    pub is_stage: bool,
    pub blocks: Blocks,
    pub variables: IndexMap<String, Variable>,
    pub costumes: Vec<Costume>,
    pub sounds: Vec<Sound>,
    pub current_costume: usize,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub direction: f64,
    pub visible: bool,
    pub draggable: bool,
    pub rotation_style: String,
    pub tempo: f64,
    pub video_transparency: f64,
    pub video_state: String,
    pub library_index: Option<i64>,
}

impl Target {
    fn new(id: String, name: &str, is_stage: bool) -> Self {
        Self {
            id,
            name: name.to_string(),
            is_stage,
            blocks: Blocks::new(),
            variables: IndexMap::new(),
            costumes: Vec::new(),
            sounds: Vec::new(),
            current_costume: 0,
            x: 0.0,
            y: 0.0,
            size: 100.0,
            direction: 90.0,
            visible: true,
            draggable: false,
            rotation_style: "all around".to_string(),
            tempo: 60.0,
            video_transparency: 50.0,
            video_state: "on".to_string(),
            library_index: None,
        }
    }

    pub fn variables_of(&self, kind: VariableKind) -> impl Iterator<Item = &Variable> {
        self.variables.values().filter(move |v| v.kind == kind)
    }

    fn apply_transform(&mut self, object: &ProjectObject) {
        if let Some(x) = object.scratch_x {
            self.x = x;
        }
        if let Some(y) = object.scratch_y {
            self.y = y;
        }
        if let Some(direction) = object.direction {
            self.direction = direction;
        }
        if let Some(scale) = object.scale {
            self.size = scale * 100.0;
        }
        if let Some(visible) = object.visible {
            self.visible = visible;
        }
        if let Some(draggable) = object.is_draggable {
            self.draggable = draggable;
        }
        if let Some(style) = object.rotation_style.as_deref() {
            self.rotation_style = match style {
                "leftRight" => "left-right",
                "none" => "don't rotate",
                _ => "all around",
            }
            .to_string();
        }
        if let Some(index) = object.current_costume_index {
            self.current_costume = index.round().max(0.0) as usize;
        }
        if let Some(tempo) = object.tempo_bpm {
            self.tempo = tempo;
        }
        if let Some(alpha) = object.video_alpha {
            self.video_transparency = 100.0 - 100.0 * alpha;
        }
        if let Some(on) = object.info.video_on {
            self.video_state = if on { "on" } else { "off" }.to_string();
        }
        self.library_index = object.index_in_library;
    }
}

#[derive(Debug, Clone)]
pub struct ImportResult {
    pub targets: Vec<Target>,
    pub extensions: Vec<String>,
}

impl ImportResult {
    pub fn stage(&self) -> Option<&Target> {
        self.targets.iter().find(|t| t.is_stage)
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }
}

#[derive(Default)]
struct ImportState {
    ids: IdGenerator,
    variables: VariableIdRegistry,
    broadcasts: BroadcastRegistry,
    extensions: IndexSet<String>,
}

/// Shared by every object future of one import. The state is only borrowed
/// between suspension points.
struct ImportContext<'a> {
    spec_map: &'a SpecMap,
    assets: &'a dyn AssetSource,
    state: RefCell<ImportState>,
}

impl<'a> ImportContext<'a> {
    fn new(spec_map: &'a SpecMap, assets: &'a dyn AssetSource) -> Self {
        Self {
            spec_map,
            assets,
            state: RefCell::new(ImportState::default()),
        }
    }

    fn decode_target(&self, object: &ProjectObject, name: &str, root: bool) -> Target {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if root {
            state.variables.reset();
        }
        let mut target = Target::new(state.ids.new_id("target"), name, root);
        let scope = VariableScope::new(&target.id, root);

        for record in &object.variables {
            let id = state.variables.resolve(&scope, &record.name);
            target.variables.insert(
                id.clone(),
                Variable {
                    id,
                    name: record.name.clone(),
                    kind: VariableKind::Scalar,
                    value: record.value.clone(),
                    is_cloud: record.is_persistent,
                },
            );
        }
        for record in &object.lists {
            let id = state.variables.resolve(&scope, &record.list_name);
            target.variables.insert(
                id.clone(),
                Variable {
                    id,
                    name: record.list_name.clone(),
                    kind: VariableKind::List,
                    value: Value::Array(record.contents.clone()),
                    is_cloud: record.is_persistent,
                },
            );
        }

        let mut cx = DecodeContext {
            spec_map: self.spec_map,
            ids: &mut state.ids,
            variables: &mut state.variables,
            scope: &scope,
            broadcasts: &mut state.broadcasts,
            extensions: &mut state.extensions,
        };
        for script in &object.scripts {
            let mut decoded = decode_block_list(script.records(), &mut cx);
            let Some(first) = decoded.first_mut() else {
                continue;
            };
            first.block.x = Some(script.x() * WORKSPACE_SCALE_X);
            first.block.y = Some(script.y() * WORKSPACE_SCALE_Y);
            first.block.top_level = true;
            first.block.parent = None;
            for block in flatten(decoded) {
                target.blocks.create_block(block);
            }
        }

        target.apply_transform(object);
        debug!(
            "Decoded '{}': {} blocks, {} variables",
            target.name,
            target.blocks.len(),
            target.variables.len()
        );
        target
    }

    fn finalize_broadcasts(&self, targets: &mut [Target]) {
        let mut state = self.state.borrow_mut();
        if let Some(resolution) = state.broadcasts.finalize() {
            let value = Value::String(resolution.name.clone());
            for location in &resolution.fields {
                let rewritten = targets.iter_mut().any(|target| {
                    target
                        .blocks
                        .set_field_value(&location.block_id, &location.field, value.clone())
                });
                if !rewritten {
                    warn!(
                        "Broadcast field {}.{} is not in any target",
                        location.block_id, location.field
                    );
                }
            }
        }

        let Some(stage) = targets.iter_mut().find(|t| t.is_stage) else {
            return;
        };
        for entry in state.broadcasts.messages() {
            stage.variables.insert(
                entry.id.clone(),
                Variable {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    kind: VariableKind::Broadcast,
                    value: Value::String(entry.name.clone()),
                    is_cloud: false,
                },
            );
        }
    }
}

pub async fn import_project(
    document: &ProjectObject,
    spec_map: &SpecMap,
    assets: &dyn AssetSource,
) -> Result<ImportResult> {
    let cx = ImportContext::new(spec_map, assets);
    let mut targets = import_object(&cx, document, true).await?;
    cx.finalize_broadcasts(&mut targets);
    let state = cx.state.into_inner();
    Ok(ImportResult {
        targets,
        extensions: state.extensions.into_iter().collect(),
    })
}

fn import_object<'a>(
    cx: &'a ImportContext<'a>,
    object: &'a ProjectObject,
    root: bool,
) -> LocalBoxFuture<'a, Result<Vec<Target>>> {
    Box::pin(async move {
        let Some(name) = object.obj_name.as_deref() else {
            debug!("Dropping object without objName");
            return Ok(Vec::new());
        };
        let mut target = cx.decode_target(object, name, root);

        let costume_loads = object.costumes.iter().map(|record| {
            cx.assets
                .load_costume(record.base_layer_md5.clone(), Costume::from_record(record))
        });
        let sound_loads = object
            .sounds
            .iter()
            .map(|record| cx.assets.load_sound(record.md5.clone(), Sound::from_record(record)));
        let children = object
            .children
            .iter()
            .map(|child| import_object(cx, child, false));

        let (costumes, sounds, nested) = futures::try_join!(
            try_join_all(costume_loads),
            try_join_all(sound_loads),
            try_join_all(children)
        )?;
        target.costumes = costumes;
        target.sounds = sounds;

        let mut out = vec![target];
        out.extend(nested.into_iter().flatten());
        Ok(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::parse_project_json;
    use anyhow::anyhow;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryAssets {
        files: HashMap<String, Vec<u8>>,
    }

    impl AssetSource for MemoryAssets {
        fn load_costume(&self, md5ext: String, mut costume: Costume) -> LocalBoxFuture<'_, Result<Costume>> {
            Box::pin(async move {
                costume.data = self
                    .files
                    .get(&md5ext)
                    .cloned()
                    .ok_or_else(|| anyhow!("missing costume {}", md5ext))?;
                Ok(costume)
            })
        }

        fn load_sound(&self, md5ext: String, mut sound: Sound) -> LocalBoxFuture<'_, Result<Sound>> {
            Box::pin(async move {
                sound.data = self
                    .files
                    .get(&md5ext)
                    .cloned()
                    .ok_or_else(|| anyhow!("missing sound {}", md5ext))?;
                Ok(sound)
            })
        }
    }

    async fn import(document: Value) -> Result<ImportResult> {
        let project = parse_project_json(&document.to_string())?;
        import_project(&project, &SpecMap::builtin(), &MemoryAssets::default()).await
    }

    fn field_id(target: &Target, opcode: &str, field: &str) -> Option<String> {
        target
            .blocks
            .iter()
            .find(|b| b.opcode == opcode)
            .and_then(|b| b.fields.get(field))
            .and_then(|f| f.id.clone())
    }

    #[test_log::test(tokio::test)]
    async fn root_variables_are_visible_to_sprites() {
        let result = import(json!({
            "objName": "Stage",
            "variables": [{"name": "score", "value": 0}],
            "children": [
                {"objName": "Cat", "scripts": [[0, 0, [["setVar:to:", "score", 1]]]]},
                {
                    "objName": "Dog",
                    "variables": [{"name": "counter", "value": 3}],
                    "scripts": [[0, 0, [["changeVar:by:", "counter", 1]]]]
                }
            ]
        }))
        .await
        .unwrap();

        let stage = result.stage().unwrap();
        let score_id = format!("{}-score", stage.id);
        assert!(stage.variables.contains_key(&score_id));
        let cat = result.target("Cat").unwrap();
        assert_eq!(field_id(cat, "data_setvariableto", "VARIABLE"), Some(score_id));
        let dog = result.target("Dog").unwrap();
        let counter_id = format!("{}-counter", dog.id);
        assert_eq!(dog.variables[&counter_id].value, json!(3));
        assert_eq!(field_id(dog, "data_changevariableby", "VARIABLE"), Some(counter_id));
    }

    #[test_log::test(tokio::test)]
    async fn scripts_are_scaled_and_linked() {
        let result = import(json!({
            "objName": "Stage",
            "scripts": [
                [10, 20, [["whenGreenFlag"], ["bogusBlock"], ["doForever", [["nextScene"]]]]],
                [0, 0, [["undefinedHat"]]]
            ]
        }))
        .await
        .unwrap();
        let blocks = &result.targets[0].blocks;
        assert_eq!(blocks.scripts().len(), 1);
        let hat = blocks.get(&blocks.scripts()[0]).unwrap();
        assert_eq!(hat.opcode, "event_whenflagclicked");
        assert!(hat.top_level);
        assert!(hat.parent.is_none());
        assert_eq!(hat.x, Some(15.0));
        assert_eq!(hat.y, Some(20.0 * 2.2));
        let forever = blocks.get(hat.next.as_deref().unwrap()).unwrap();
        assert_eq!(forever.opcode, "control_forever");
        assert_eq!(forever.parent.as_deref(), Some(hat.id.as_str()));
        assert!(!forever.top_level);

        let order = blocks.iter().map(|b| b.id.clone()).collect::<Vec<_>>();
        for block in blocks.iter() {
            if let Some(parent) = &block.parent {
                let parent_at = order.iter().position(|id| id == parent).unwrap();
                let self_at = order.iter().position(|id| id == &block.id).unwrap();
                assert!(parent_at < self_at);
            }
        }
    }

    #[test_log::test(tokio::test)]
    async fn objects_without_names_are_dropped() {
        let result = import(json!({
            "objName": "Stage",
            "children": [
                {"objName": "Cat", "children": [{"objName": "Kitten"}]},
                {"target": "Stage", "cmd": "getVar:", "param": "score"},
                {"objName": "Dog"}
            ]
        }))
        .await
        .unwrap();
        let names = result.targets.iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Stage", "Cat", "Kitten", "Dog"]);
        assert!(result.targets[0].is_stage);
        assert!(!result.targets[1].is_stage);

        let nothing = import(json!({"info": {}})).await.unwrap();
        assert!(nothing.targets.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn broadcast_variables_use_folded_names() {
        let result = import(json!({
            "objName": "Stage",
            "scripts": [[0, 0, [["whenIReceive", "Go"], ["broadcast:", "GO"]]]]
        }))
        .await
        .unwrap();
        let stage = result.stage().unwrap();
        let hat = stage
            .blocks
            .iter()
            .find(|b| b.opcode == "event_whenbroadcastreceived")
            .unwrap();
        assert_eq!(hat.field_value("BROADCAST_OPTION"), Some(&json!("Go")));
        let broadcasts = stage
            .variables_of(VariableKind::Broadcast)
            .map(|v| (v.id.clone(), v.name.clone()))
            .collect::<Vec<_>>();
        assert_eq!(
            broadcasts,
            vec![("broadcastMsgId-go".to_string(), "go".to_string())]
        );
    }

    #[test_log::test(tokio::test)]
    async fn empty_broadcasts_become_fresh_messages() {
        let result = import(json!({
            "objName": "Stage",
            "scripts": [[0, 0, [["whenIReceive", ""], ["broadcast:", "Message1"]]]],
            "children": [
                {"objName": "Cat", "scripts": [[0, 0, [["whenGreenFlag"], ["doBroadcastAndWait", ""]]]]}
            ]
        }))
        .await
        .unwrap();

        let stage = result.stage().unwrap();
        let hat = stage
            .blocks
            .iter()
            .find(|b| b.opcode == "event_whenbroadcastreceived")
            .unwrap();
        assert_eq!(hat.field_value("BROADCAST_OPTION"), Some(&json!("message2")));
        let cat = result.target("Cat").unwrap();
        let menu = cat
            .blocks
            .iter()
            .find(|b| b.opcode == "event_broadcast_menu")
            .unwrap();
        assert_eq!(menu.field_value("BROADCAST_OPTION"), Some(&json!("message2")));
        assert_eq!(
            hat.fields["BROADCAST_OPTION"].id,
            menu.fields["BROADCAST_OPTION"].id
        );

        let mut names = stage
            .variables_of(VariableKind::Broadcast)
            .map(|v| v.name.clone())
            .collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["message1", "message2"]);
        assert_eq!(cat.variables_of(VariableKind::Broadcast).count(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn transform_properties_are_carried() {
        let result = import(json!({
            "objName": "Stage",
            "tempoBPM": 90,
            "videoAlpha": 0.25,
            "info": {"videoOn": false},
            "lists": [{"listName": "items", "contents": ["a", "b"]}],
            "children": [{
                "objName": "Cat",
                "scratchX": 12.5,
                "scratchY": -4,
                "scale": 0.5,
                "direction": -90,
                "rotationStyle": "leftRight",
                "isDraggable": true,
                "visible": false,
                "currentCostumeIndex": 1.6,
                "indexInLibrary": 3
            }]
        }))
        .await
        .unwrap();
        let stage = result.stage().unwrap();
        assert_eq!(stage.tempo, 90.0);
        assert_eq!(stage.video_transparency, 75.0);
        assert_eq!(stage.video_state, "off");
        let list = stage.variables_of(VariableKind::List).next().unwrap();
        assert_eq!(list.value, json!(["a", "b"]));

        let cat = result.target("Cat").unwrap();
        assert_eq!((cat.x, cat.y), (12.5, -4.0));
        assert_eq!(cat.size, 50.0);
        assert_eq!(cat.direction, -90.0);
        assert_eq!(cat.rotation_style, "left-right");
        assert!(cat.draggable);
        assert!(!cat.visible);
        assert_eq!(cat.current_costume, 2);
        assert_eq!(cat.library_index, Some(3));
    }

    #[test_log::test(tokio::test)]
    async fn assets_are_loaded_and_failures_abort() {
        let document = parse_project_json(
            &json!({
                "objName": "Stage",
                "costumes": [{"costumeName": "backdrop1", "baseLayerID": 0, "baseLayerMD5": "aa.png", "bitmapResolution": 2}],
                "sounds": [{"soundName": "pop", "soundID": 0, "md5": "bb.wav", "rate": 11025, "sampleCount": 258}],
                "children": [{"objName": "Cat", "costumes": [{"costumeName": "c", "baseLayerMD5": "cc.svg"}]}]
            })
            .to_string(),
        )
        .unwrap();
        let mut assets = MemoryAssets::default();
        assets.files.insert("aa.png".to_string(), vec![1, 2]);
        assets.files.insert("bb.wav".to_string(), vec![3]);

        let err = import_project(&document, &SpecMap::builtin(), &assets)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cc.svg"));

        assets.files.insert("cc.svg".to_string(), b"<svg/>".to_vec());
        let result = import_project(&document, &SpecMap::builtin(), &assets)
            .await
            .unwrap();
        let stage = result.stage().unwrap();
        assert_eq!(stage.costumes[0].data, vec![1, 2]);
        assert_eq!(stage.costumes[0].bitmap_resolution, 2.0);
        assert_eq!(stage.sounds[0].rate, 11025);
        assert_eq!(result.target("Cat").unwrap().costumes[0].data_format, "svg");
    }

    #[test_log::test(tokio::test)]
    async fn extensions_are_reported_once() {
        let result = import(json!({
            "objName": "Stage",
            "scripts": [[0, 0, [["whenGreenFlag"], ["clearPenTrails"], ["playDrum", 1, 0.5]]]],
            "children": [{"objName": "Pen", "scripts": [[0, 0, [["putPenDown"]]]]}]
        }))
        .await
        .unwrap();
        assert_eq!(result.extensions, vec!["pen", "music"]);
    }
}
