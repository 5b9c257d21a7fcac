use crate::project::{split_md5ext, CostumeRecord, SoundRecord};
use anyhow::Result;
use futures::future::LocalBoxFuture;

#[derive(Debug, Clone, PartialEq)]
pub struct Costume {
    pub name: String,
    /// Numbered file inside a legacy archive, when the document names one.
    pub source_id: Option<i64>,
    pub asset_id: String,
    pub md5ext: String,
    pub data_format: String,
    pub bitmap_resolution: f64,
    pub rotation_center_x: f64,
    pub rotation_center_y: f64,
    pub data: Vec<u8>,
}

impl Costume {
    pub fn from_record(record: &CostumeRecord) -> Self {
        let (asset_id, data_format) = split_md5ext(&record.base_layer_md5);
        let bitmap_resolution = record.bitmap_resolution.unwrap_or(1.0);
        Self {
            name: record.costume_name.clone(),
            source_id: record.base_layer_id,
            asset_id,
            md5ext: record.base_layer_md5.clone(),
            data_format,
            bitmap_resolution,
            rotation_center_x: record.rotation_center_x,
            rotation_center_y: record.rotation_center_y,
            data: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    pub name: String,
    pub source_id: Option<i64>,
    pub asset_id: String,
    pub md5ext: String,
    pub data_format: String,
    /// Encoding marker such as `adpcm`; empty for plain PCM.
    pub format: String,
    pub rate: u32,
    pub sample_count: u64,
    pub data: Vec<u8>,
}

impl Sound {
    pub fn from_record(record: &SoundRecord) -> Self {
        let (asset_id, data_format) = split_md5ext(&record.md5);
        Self {
            name: record.sound_name.clone(),
            source_id: record.sound_id,
            asset_id,
            md5ext: record.md5.clone(),
            data_format,
            format: record.format.clone(),
            rate: record.rate,
            sample_count: record.sample_count,
            data: Vec::new(),
        }
    }
}

/// Resolves asset bytes for the importer. A failed load fails the import.
pub trait AssetSource {
    fn load_costume(&self, md5ext: String, costume: Costume) -> LocalBoxFuture<'_, Result<Costume>>;

    fn load_sound(&self, md5ext: String, sound: Sound) -> LocalBoxFuture<'_, Result<Sound>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoAssets;

impl AssetSource for NoAssets {
    fn load_costume(&self, _md5ext: String, costume: Costume) -> LocalBoxFuture<'_, Result<Costume>> {
        Box::pin(async move { Ok(costume) })
    }

    fn load_sound(&self, _md5ext: String, sound: Sound) -> LocalBoxFuture<'_, Result<Sound>> {
        Box::pin(async move { Ok(sound) })
    }
}
