pub mod archive;
pub mod assets;
pub mod blocks;
pub mod color;
pub mod decode;
pub mod import;
pub mod linker;
pub mod project;
pub mod registry;
pub mod sb3;
pub mod signature;
pub mod specmap;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(all(target_arch = "wasm32", feature = "wasm-bindings"))]
pub mod wasm;

use anyhow::{Context, Result};
use import::{import_project, ImportResult};
use specmap::SpecMap;
use std::path::{Path, PathBuf};

#[cfg(not(target_arch = "wasm32"))]
pub async fn run_cli(args: &cli::Args) -> Result<()> {
    let total_stages = 4;
    let progress = CliProgress::new("Import", total_stages);

    progress.emit(1, "Resolving input path");
    let input = canonicalize_file(&args.input)?;
    let spec_map = load_spec_map(args.spec_map.as_deref())?;

    progress.emit(2, "Reading project archive");
    let (document, archive) = archive::read_sb2(&input)?;

    progress.emit(3, "Decoding scripts and loading assets");
    let result = import_project(&document, &spec_map, &archive).await?;
    log::info!(
        "Imported {} targets ({} extensions)",
        result.targets.len(),
        result.extensions.len()
    );

    if args.json {
        progress.emit(4, "Writing project.json");
        let text = serde_json::to_string_pretty(&sb3::build_project_json(&result)?)?;
        match &args.output {
            Some(output) => std::fs::write(output, text)
                .with_context(|| format!("Failed to write '{}'.", output.display()))?,
            None => println!("{}", text),
        }
        return Ok(());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| input.with_extension("sb3"));
    let mut sb3_stage_cb = |step: usize, total: usize, label: &str| {
        let mapped = 3 + step;
        let expected_total = 3 + total;
        progress.emit_with_total(mapped, expected_total, label);
    };
    sb3::write_sb3_with_progress(&result, &output, Some(&mut sb3_stage_cb))
}

pub fn load_spec_map(path: Option<&Path>) -> Result<SpecMap> {
    let mut spec_map = SpecMap::builtin();
    if let Some(path) = path {
        spec_map.extend(SpecMap::from_json_file(path)?);
    }
    Ok(spec_map)
}

pub async fn convert_sb2_file(input: &Path, spec_map: &SpecMap) -> Result<ImportResult> {
    let input = canonicalize_file(input)?;
    let (document, archive) = archive::read_sb2(&input)?;
    import_project(&document, spec_map, &archive).await
}

pub async fn convert_sb2_bytes(bytes: &[u8], spec_map: &SpecMap) -> Result<Vec<u8>> {
    let (document, archive) = archive::read_sb2_bytes(bytes, "<memory>")?;
    let result = import_project(&document, spec_map, &archive).await?;
    sb3::build_sb3_bytes(&result)
}

pub async fn convert_sb2_bytes_to_json(bytes: &[u8], spec_map: &SpecMap) -> Result<String> {
    let (document, archive) = archive::read_sb2_bytes(bytes, "<memory>")?;
    let result = import_project(&document, spec_map, &archive).await?;
    Ok(serde_json::to_string(&sb3::build_project_json(&result)?)?)
}

pub fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!("Input file not found: '{}'.", path.display()));
    }
    Ok(path.canonicalize()?)
}

#[cfg(not(target_arch = "wasm32"))]
struct CliProgress {
    prefix: &'static str,
    total: usize,
}

#[cfg(not(target_arch = "wasm32"))]
impl CliProgress {
    fn new(prefix: &'static str, total: usize) -> Self {
        Self {
            prefix,
            total: total.max(1),
        }
    }

    fn emit(&self, step: usize, label: &str) {
        self.emit_with_total(step, self.total, label);
    }

    fn emit_with_total(&self, step: usize, total: usize, label: &str) {
        let total = total.max(1);
        let step = step.clamp(1, total);
        let bar = render_progress_bar(step, total, 14);
        eprintln!("[{}] {}... ({}/{}) {}", self.prefix, label, step, total, bar);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '=' } else { '-' });
    }
    s.push(']');
    s
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_rounds_to_width() {
        assert_eq!(render_progress_bar(1, 4, 8), "[==------]");
        assert_eq!(render_progress_bar(4, 4, 8), "[========]");
        assert_eq!(render_progress_bar(1, 3, 4), "[=---]");
    }
}
