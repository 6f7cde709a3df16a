//! maplayer: inspect GeoJSON layers and preview compositor output offline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use maplayer_compositor::{
    Compositor, CompositorSettings, LayerCatalog, LayerEntry, LayerPayload, MemoryRenderer,
    compute_bounding_box, infer_geometry_kind, parse_layer_script,
};

#[derive(Parser)]
#[command(name = "maplayer")]
#[command(version, about = "Vector layer compositor tools", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Compositor settings JSON file
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the geometry kind and bounds of a GeoJSON file or layer script
    Inspect {
        /// `.geojson`/`.json` document or QGIS2Web `.js` layer script
        input: PathBuf,
    },
    /// Run one compositor pass over a layer catalog and print the layer stack
    Plan {
        /// Catalog JSON (the layer listing of one export)
        catalog: PathBuf,
        /// Directory holding `{id}.json` payloads or `{id}.js` scripts
        #[arg(long)]
        payload_dir: Option<PathBuf>,
        /// Layer id to enable; repeatable. Defaults to every layer.
        #[arg(long = "enable")]
        enable: Vec<String>,
    },
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_geojson(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value = if path.extension().is_some_and(|ext| ext == "js") {
        parse_layer_script(&text)?
    } else {
        serde_json::from_str(&text)?
    };
    Ok(value)
}

/// Loads a layer payload from `{id}.json` (payload document) or the entry's
/// script file. Returns `None` when neither exists.
fn load_payload(dir: &Path, entry: &LayerEntry) -> Result<Option<Value>> {
    let path = dir.join(format!("{}.json", entry.id));
    if path.is_file() {
        let text = fs::read_to_string(&path)?;
        let payload = LayerPayload::from_json(&text)
            .with_context(|| format!("decoding {}", path.display()))?;
        return Ok(Some(payload.geojson));
    }

    let script_name = if entry.filename.is_empty() {
        format!("{}.js", entry.id)
    } else {
        entry.filename.clone()
    };
    let script = dir.join(script_name);
    if script.is_file() {
        return read_geojson(&script).map(Some);
    }
    Ok(None)
}

fn load_settings(path: Option<&Path>) -> Result<CompositorSettings> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            CompositorSettings::from_json(&text)
                .with_context(|| format!("decoding settings {}", path.display()))
        }
        None => Ok(CompositorSettings::default()),
    }
}

fn inspect(input: &Path) -> Result<Value> {
    let geojson = read_geojson(input)?;
    let bounds = compute_bounding_box(&geojson).map(|b| b.corners());
    Ok(json!({
        "file": input.display().to_string(),
        "kind": infer_geometry_kind(&geojson),
        "bounds": bounds,
    }))
}

fn plan(
    settings: CompositorSettings,
    catalog_path: &Path,
    payload_dir: Option<&Path>,
    enable: Vec<String>,
) -> Result<Value> {
    let text = fs::read_to_string(catalog_path)
        .with_context(|| format!("reading {}", catalog_path.display()))?;
    let mut catalog = LayerCatalog::from_json(&text)?;
    catalog.sort();

    let dir = payload_dir
        .map(Path::to_path_buf)
        .or_else(|| catalog_path.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let enabled = if enable.is_empty() {
        catalog.layers.iter().map(|l| l.id.clone()).collect()
    } else {
        enable
    };

    let mut payloads = HashMap::new();
    for id in &enabled {
        let Some(entry) = catalog.get(id) else {
            warn!(%id, "not in catalog");
            continue;
        };
        match load_payload(&dir, entry)? {
            Some(geojson) => {
                debug!(%id, "payload loaded");
                payloads.insert(id.clone(), Arc::new(geojson));
            }
            None => warn!(%id, dir = %dir.display(), "no payload found"),
        }
    }

    let specs = catalog.layer_specs(&enabled, &payloads);
    let mut renderer = MemoryRenderer::new();
    let mut compositor = Compositor::new(settings);
    let report = compositor.synchronize(&specs, &mut renderer)?;
    info!(
        layers = report.layers_added,
        sources = report.sources_added,
        "planned {} of {} layers",
        specs.len(),
        catalog.layers.len()
    );

    Ok(json!({
        "export": catalog.export,
        "enabled": specs.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
        "style": renderer.style_json(),
    }))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    let settings = load_settings(cli.settings.as_deref())?;

    let output = match cli.command {
        Commands::Inspect { input } => inspect(&input)?,
        Commands::Plan {
            catalog,
            payload_dir,
            enable,
        } => plan(settings, &catalog, payload_dir.as_deref(), enable)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
