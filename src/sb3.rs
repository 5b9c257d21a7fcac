use crate::blocks::CanonicalBlock;
use crate::import::{ImportResult, Target, VariableKind};
use anyhow::{anyhow, Result};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;

type Sb3ProgressCallback<'a> = dyn FnMut(usize, usize, &str) + 'a;

pub fn write_sb3(result: &ImportResult, output_path: &Path) -> Result<()> {
    write_sb3_with_progress(result, output_path, Option::<&mut fn(usize, usize, &str)>::None)
}

pub fn write_sb3_with_progress<F>(
    result: &ImportResult,
    output_path: &Path,
    progress: Option<&mut F>,
) -> Result<()>
where
    F: FnMut(usize, usize, &str),
{
    let bytes = build_sb3_bytes_with_progress(result, progress)?;
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, bytes)?;
    Ok(())
}

pub fn build_sb3_bytes(result: &ImportResult) -> Result<Vec<u8>> {
    build_sb3_bytes_with_progress(result, Option::<&mut fn(usize, usize, &str)>::None)
}

pub fn build_sb3_bytes_with_progress<F>(result: &ImportResult, progress: Option<&mut F>) -> Result<Vec<u8>>
where
    F: FnMut(usize, usize, &str),
{
    let mut progress = progress.map(|cb| cb as &mut Sb3ProgressCallback<'_>);
    let project_json = build_project_json(result)?;
    let assets = collect_assets(result);

    let mut buffer = Cursor::new(Vec::<u8>::new());
    let mut zip = zip::ZipWriter::new(&mut buffer);
    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    report_progress(&mut progress, 1, 1, "Writing project.json");
    zip.start_file("project.json", opts)?;
    let project_bytes = serde_json::to_vec_pretty(&project_json)?;
    zip.write_all(&project_bytes)?;

    let asset_total = assets.len().max(1);
    if assets.is_empty() {
        report_progress(&mut progress, 1, 1, "Packaging assets");
    }
    for (index, (name, bytes)) in assets.into_iter().enumerate() {
        zip.start_file(name, opts)?;
        zip.write_all(bytes)?;
        report_progress(&mut progress, index + 1, asset_total, "Packaging assets");
    }
    zip.finish()?;
    Ok(buffer.into_inner())
}

fn report_progress(
    progress: &mut Option<&mut Sb3ProgressCallback<'_>>,
    step: usize,
    total: usize,
    label: &str,
) {
    if let Some(cb) = progress.as_deref_mut() {
        cb(step, total, label);
    }
}

fn collect_assets(result: &ImportResult) -> BTreeMap<&str, &[u8]> {
    let mut assets = BTreeMap::new();
    for target in &result.targets {
        for costume in &target.costumes {
            assets.insert(costume.md5ext.as_str(), costume.data.as_slice());
        }
        for sound in &target.sounds {
            assets.insert(sound.md5ext.as_str(), sound.data.as_slice());
        }
    }
    assets
}

/// Stage first, then sprites in library order. Sprites keep their document
/// position as layer order.
pub fn build_project_json(result: &ImportResult) -> Result<Value> {
    let mut ordered = Vec::new();
    let mut sprite_layer = 0;
    for target in &result.targets {
        let layer = if target.is_stage {
            0
        } else {
            sprite_layer += 1;
            sprite_layer
        };
        ordered.push((target, layer));
    }
    ordered.sort_by_key(|(target, _)| {
        (
            !target.is_stage,
            target.library_index.is_none(),
            target.library_index.unwrap_or_default(),
        )
    });

    let targets_json = ordered
        .into_iter()
        .map(|(target, layer)| build_target_json(target, layer))
        .collect::<Result<Vec<_>>>()?;
    Ok(json!({
        "targets": targets_json,
        "monitors": [],
        "extensions": result.extensions,
        "meta": {
            "semver": "3.0.0",
            "vm": "0.2.0",
            "agent": "sb2-import"
        }
    }))
}

fn build_target_json(target: &Target, layer_order: usize) -> Result<Value> {
    let mut variables_json = Map::new();
    let mut lists_json = Map::new();
    let mut broadcasts_json = Map::new();
    for variable in target.variables.values() {
        match variable.kind {
            VariableKind::Scalar => {
                let entry = if variable.is_cloud {
                    json!([variable.name, variable.value, true])
                } else {
                    json!([variable.name, variable.value])
                };
                variables_json.insert(variable.id.clone(), entry);
            }
            VariableKind::List => {
                lists_json.insert(variable.id.clone(), json!([variable.name, variable.value]));
            }
            VariableKind::Broadcast => {
                broadcasts_json.insert(variable.id.clone(), Value::String(variable.name.clone()));
            }
        }
    }

    let mut blocks_json = Map::new();
    for block in target.blocks.iter() {
        blocks_json.insert(block.id.clone(), block_json(block)?);
    }

    let costumes = target
        .costumes
        .iter()
        .map(|costume| {
            let mut entry = json!({
                "name": costume.name,
                "assetId": costume.asset_id,
                "md5ext": costume.md5ext,
                "dataFormat": costume.data_format,
                "rotationCenterX": costume.rotation_center_x,
                "rotationCenterY": costume.rotation_center_y
            });
            if costume.data_format != "svg" {
                merge_object(&mut entry, json!({"bitmapResolution": costume.bitmap_resolution}))?;
            }
            Ok(entry)
        })
        .collect::<Result<Vec<_>>>()?;
    let sounds = target
        .sounds
        .iter()
        .map(|sound| {
            json!({
                "name": sound.name,
                "assetId": sound.asset_id,
                "md5ext": sound.md5ext,
                "dataFormat": sound.data_format,
                "format": sound.format,
                "rate": sound.rate,
                "sampleCount": sound.sample_count
            })
        })
        .collect::<Vec<_>>();

    let current_costume = target
        .current_costume
        .min(target.costumes.len().saturating_sub(1));
    let mut target_json = json!({
        "isStage": target.is_stage,
        "name": target.name,
        "variables": variables_json,
        "lists": lists_json,
        "broadcasts": broadcasts_json,
        "blocks": blocks_json,
        "comments": {},
        "currentCostume": current_costume,
        "costumes": costumes,
        "sounds": sounds,
        "volume": 100,
        "layerOrder": layer_order
    });
    if target.is_stage {
        merge_object(
            &mut target_json,
            json!({
                "tempo": target.tempo,
                "videoTransparency": target.video_transparency,
                "videoState": target.video_state,
                "textToSpeechLanguage": Value::Null
            }),
        )?;
    } else {
        merge_object(
            &mut target_json,
            json!({
                "visible": target.visible,
                "x": target.x,
                "y": target.y,
                "size": target.size,
                "direction": target.direction,
                "draggable": target.draggable,
                "rotationStyle": target.rotation_style
            }),
        )?;
    }
    Ok(target_json)
}

fn block_json(block: &CanonicalBlock) -> Result<Value> {
    let mut inputs = Map::new();
    for (name, input) in &block.inputs {
        let encoded = match (&input.block, &input.shadow) {
            (Some(b), Some(s)) if b == s => json!([1, s]),
            (Some(b), Some(s)) => json!([3, b, s]),
            (Some(b), None) => json!([2, b]),
            (None, Some(s)) => json!([1, s]),
            (None, None) => continue,
        };
        inputs.insert(name.clone(), encoded);
    }
    let mut fields = Map::new();
    for (name, field) in &block.fields {
        fields.insert(name.clone(), json!([field.value, field.id]));
    }

    let mut out = json!({
        "opcode": block.opcode,
        "next": block.next,
        "parent": block.parent,
        "inputs": inputs,
        "fields": fields,
        "shadow": block.shadow,
        "topLevel": block.top_level
    });
    if block.top_level {
        merge_object(
            &mut out,
            json!({"x": block.x.unwrap_or_default(), "y": block.y.unwrap_or_default()}),
        )?;
    }
    if let Some(mutation) = &block.mutation {
        merge_object(&mut out, json!({"mutation": serde_json::to_value(mutation)?}))?;
    }
    Ok(out)
}

fn merge_object(dst: &mut Value, add: Value) -> Result<()> {
    let dst_obj = dst
        .as_object_mut()
        .ok_or_else(|| anyhow!("Expected object in merge_object dst"))?;
    let Value::Object(add_obj) = add else {
        return Err(anyhow!("Expected object in merge_object add"));
    };
    dst_obj.extend(add_obj);
    Ok(())
}
