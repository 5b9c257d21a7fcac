use crate::assets::{AssetSource, Costume, Sound};
use crate::project::{parse_project_json, ProjectObject};
use anyhow::{anyhow, Context, Result};
use futures::future::LocalBoxFuture;
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

#[derive(Debug, Clone, Default)]
pub struct Sb2Archive {
    label: String,
    files: HashMap<String, Vec<u8>>,
}

impl Sb2Archive {
    pub fn empty(label: &str) -> Self {
        Self {
            label: label.to_string(),
            files: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, bytes: Vec<u8>) {
        self.files.insert(name.to_string(), bytes);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Numbered file first, then the content reference itself.
    fn lookup(&self, source_id: Option<i64>, data_format: &str, md5ext: &str) -> Result<Vec<u8>> {
        if let Some(id) = source_id {
            if let Some(bytes) = self.files.get(&format!("{}.{}", id, data_format)) {
                return Ok(bytes.clone());
            }
        }
        self.files
            .get(md5ext)
            .cloned()
            .ok_or_else(|| anyhow!("Asset '{}' not found in '{}'.", md5ext, self.label))
    }
}

fn content_id(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

impl AssetSource for Sb2Archive {
    fn load_costume(&self, md5ext: String, mut costume: Costume) -> LocalBoxFuture<'_, Result<Costume>> {
        Box::pin(async move {
            let data = self
                .lookup(costume.source_id, &costume.data_format, &md5ext)
                .with_context(|| format!("Failed to load costume '{}'.", costume.name))?;
            costume.asset_id = content_id(&data);
            costume.md5ext = format!("{}.{}", costume.asset_id, costume.data_format);
            costume.data = data;
            Ok(costume)
        })
    }

    fn load_sound(&self, md5ext: String, mut sound: Sound) -> LocalBoxFuture<'_, Result<Sound>> {
        Box::pin(async move {
            let data = self
                .lookup(sound.source_id, &sound.data_format, &md5ext)
                .with_context(|| format!("Failed to load sound '{}'.", sound.name))?;
            sound.asset_id = content_id(&data);
            sound.md5ext = format!("{}.{}", sound.asset_id, sound.data_format);
            sound.data = data;
            Ok(sound)
        })
    }
}

pub fn read_sb2(input: &Path) -> Result<(ProjectObject, Sb2Archive)> {
    let label = input.display().to_string();
    let is_json = input
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        let text = fs::read_to_string(input)
            .with_context(|| format!("Failed to read '{}'.", label))?;
        let project = parse_project_json(&text)
            .with_context(|| format!("Invalid project document '{}'.", label))?;
        return Ok((project, Sb2Archive::empty(&label)));
    }
    let file = fs::File::open(input).with_context(|| format!("Failed to open '{}'.", label))?;
    read_zip(file, &label)
}

pub fn read_sb2_bytes(bytes: &[u8], label: &str) -> Result<(ProjectObject, Sb2Archive)> {
    read_zip(Cursor::new(bytes), label)
}

fn read_zip<R: Read + Seek>(reader: R, label: &str) -> Result<(ProjectObject, Sb2Archive)> {
    let mut zip = ZipArchive::new(reader)
        .with_context(|| format!("'{}' is not a valid zip/.sb2 file.", label))?;

    let mut project_json = String::new();
    zip.by_name("project.json")
        .map_err(|_| anyhow!("project.json not found in '{}'.", label))?
        .read_to_string(&mut project_json)?;
    let project = parse_project_json(&project_json)
        .with_context(|| format!("Invalid project.json inside '{}'.", label))?;

    let mut archive = Sb2Archive::empty(label);
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let name = entry.name().to_string();
        if name == "project.json" || name.ends_with('/') {
            continue;
        }
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        archive.insert(&name, bytes);
    }
    debug!("Read {} asset files from '{}'", archive.len(), label);
    Ok((project, archive))
}
