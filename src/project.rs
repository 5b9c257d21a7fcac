use serde::Deserialize;
use serde_json::Value;

/// One node of a legacy project document: the stage at the root, sprites and
/// watchers under `children`. Watchers carry no `objName`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectObject {
    pub obj_name: Option<String>,
    pub costumes: Vec<CostumeRecord>,
    pub sounds: Vec<SoundRecord>,
    pub variables: Vec<VariableRecord>,
    pub lists: Vec<ListRecord>,
    pub scripts: Vec<ScriptRecord>,
    pub children: Vec<ProjectObject>,
    pub current_costume_index: Option<f64>,
    pub scratch_x: Option<f64>,
    pub scratch_y: Option<f64>,
    pub scale: Option<f64>,
    pub direction: Option<f64>,
    pub rotation_style: Option<String>,
    pub is_draggable: Option<bool>,
    pub visible: Option<bool>,
    pub index_in_library: Option<i64>,
    #[serde(rename = "tempoBPM")]
    pub tempo_bpm: Option<f64>,
    pub video_alpha: Option<f64>,
    pub info: ObjectInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectInfo {
    pub video_on: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CostumeRecord {
    pub costume_name: String,
    #[serde(rename = "baseLayerID")]
    pub base_layer_id: Option<i64>,
    #[serde(rename = "baseLayerMD5")]
    pub base_layer_md5: String,
    pub bitmap_resolution: Option<f64>,
    pub rotation_center_x: f64,
    pub rotation_center_y: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoundRecord {
    pub sound_name: String,
    #[serde(rename = "soundID")]
    pub sound_id: Option<i64>,
    pub md5: String,
    pub sample_count: u64,
    pub rate: u32,
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableRecord {
    pub name: String,
    pub value: Value,
    pub is_persistent: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListRecord {
    pub list_name: String,
    pub contents: Vec<Value>,
    pub is_persistent: bool,
}

/// `[x, y, [record, record, ...]]`
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptRecord(pub f64, pub f64, pub Vec<Value>);

impl ScriptRecord {
    pub fn x(&self) -> f64 {
        self.0
    }

    pub fn y(&self) -> f64 {
        self.1
    }

    pub fn records(&self) -> &[Value] {
        &self.2
    }
}

pub fn parse_project_json(text: &str) -> anyhow::Result<ProjectObject> {
    Ok(serde_json::from_str(text)?)
}

pub fn split_md5ext(md5ext: &str) -> (String, String) {
    match md5ext.rsplit_once('.') {
        Some((md5, ext)) => (md5.to_string(), ext.to_lowercase()),
        None => (md5ext.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stage_with_sprite_and_watcher() {
        let project = parse_project_json(
            r#"{
                "objName": "Stage",
                "variables": [{"name": "score", "value": 0, "isPersistent": false}],
                "scripts": [[10, 20, [["whenGreenFlag"]]]],
                "tempoBPM": 90,
                "children": [
                    {"objName": "Cat", "scratchX": 5, "scale": 0.5},
                    {"target": "Stage", "cmd": "getVar:", "param": "score", "visible": true}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(project.obj_name.as_deref(), Some("Stage"));
        assert_eq!(project.variables[0].name, "score");
        assert_eq!(project.scripts[0].x(), 10.0);
        assert_eq!(project.scripts[0].records().len(), 1);
        assert_eq!(project.tempo_bpm, Some(90.0));
        assert_eq!(project.children.len(), 2);
        assert_eq!(project.children[0].scale, Some(0.5));
        assert!(project.children[1].obj_name.is_none());
    }

    #[test]
    fn splits_content_reference() {
        assert_eq!(
            split_md5ext("83a9787d4cb6f3b7632b4ddfebf74367.PNG"),
            ("83a9787d4cb6f3b7632b4ddfebf74367".to_string(), "png".to_string())
        );
    }
}
