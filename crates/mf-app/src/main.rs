//! Command line entry point

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mf_core::ViewRegistry;
use mf_data::{features_from_json, FieldType, FilterSpec};
use mf_views::{color_hex, GridLayout, Pipeline, PipelineConfig, PipelineSnapshot, DEFAULT_THUMB_SIZE};

#[derive(Parser)]
#[command(name = "mapfilter")]
#[command(author, version, about = "Analyze, filter and color a geotagged feature collection")]
struct Cli {
    /// Feature collection (GeoJSON FeatureCollection or array of features)
    features: PathBuf,

    /// Filter spec: an array of clauses or a legacy `["all", ...]` expression
    #[arg(short, long)]
    filter: Option<PathBuf>,

    /// Field to color markers by
    #[arg(short, long)]
    color_field: Option<String>,

    /// Pipeline configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show the detail card of a feature
    #[arg(long)]
    detail: Option<String>,

    /// Fields to hide on the detail card
    #[arg(long)]
    hide: Vec<String>,

    /// Media grid width in pixels
    #[arg(long, default_value = "800")]
    grid_width: f32,
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn load_filter(path: &Path) -> Result<FilterSpec> {
    let value = read_json(path)?;
    let legacy = value
        .as_array()
        .and_then(|items| items.first())
        .map_or(false, Value::is_string);
    if legacy {
        return Ok(FilterSpec::from_expression(&value));
    }
    serde_json::from_value(value).with_context(|| format!("Invalid filter spec in {}", path.display()))
}

fn type_name(field_type: FieldType) -> String {
    match field_type {
        FieldType::Continuous(kind) => format!("continuous ({:?})", kind).to_lowercase(),
        FieldType::Discrete => "discrete".to_string(),
        FieldType::SpaceDelimited => "space-delimited".to_string(),
        FieldType::Location => "location".to_string(),
        FieldType::Unknown => "unknown".to_string(),
    }
}

fn print_analysis(snapshot: &PipelineSnapshot) {
    println!("Fields ({}):", snapshot.analysis.len());
    for (key, stat) in snapshot.analysis.iter() {
        let detail = match (&stat.range, stat.values.len()) {
            (Some(range), _) => format!("range {} to {}", range.min, range.max),
            (None, 0) => String::new(),
            (None, n) => format!("{} distinct values", n),
        };
        println!(
            "  {:<24} {:<20} {:>6} defined {:>6} null  {}",
            key,
            type_name(stat.field_type),
            stat.count,
            stat.null_count,
            detail
        );
    }
}

fn print_legend(snapshot: &PipelineSnapshot) {
    let Some(field) = snapshot.color_index.field() else {
        return;
    };
    println!("Colors by '{}':", field);
    for entry in snapshot.color_index.legend() {
        println!("  {:>3} {} {}", entry.marker, color_hex(entry.color), entry.label);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
            PipelineConfig::from_json(&text).with_context(|| format!("Invalid config in {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    if cli.color_field.is_some() {
        config.color_field = cli.color_field.clone();
    }

    let pipeline = Pipeline::new(config);

    let features = features_from_json(read_json(&cli.features)?)
        .with_context(|| format!("Invalid feature collection in {}", cli.features.display()))?;
    pipeline.load_features(features)?;

    if let Some(path) = &cli.filter {
        pipeline.set_filter(load_filter(path)?);
    }

    let snapshot = pipeline.snapshot();
    for rejected in &snapshot.rejected {
        warn!("Filter clause ignored: {}", rejected);
    }

    print_analysis(&snapshot);
    println!();
    println!("Matched {} of {} features", snapshot.filtered.len(), snapshot.features.len());
    print_legend(&snapshot);

    let mapping = snapshot.guess_mapping();
    let media = snapshot.media(&mapping);
    if !media.is_empty() {
        let grid = GridLayout::compute(media.len(), cli.grid_width, f32::INFINITY, DEFAULT_THUMB_SIZE, 0.0);
        println!(
            "Media: {} images in {} columns x {} rows",
            media.len(),
            grid.columns,
            grid.rows
        );
    }

    if let Some(id) = &cli.detail {
        let views = ViewRegistry::new();
        let view = views.register_view();
        views.sync_known_fields(&snapshot.analysis.keys().collect::<Vec<_>>());
        for key in &cli.hide {
            views.update(view, |state| state.set_field_hidden(key, true));
        }
        let state = views.state(view).unwrap_or_default();

        let detail = snapshot
            .detail(id, &mapping, &state)
            .with_context(|| format!("No feature with id '{}'", id))?;

        println!();
        let title = detail.title.map(|t| t.value.to_string()).unwrap_or_else(|| detail.id.clone());
        println!("{} {} [{}]", detail.marker.as_deref().unwrap_or("-"), title, color_hex(detail.color));
        if let Some(subtitle) = detail.subtitle {
            println!("  {}", subtitle.value);
        }
        for row in &detail.rows {
            println!("  {:<24} {}", row.key, row.value);
        }
        println!("  ({})", state.hidden_fields_label());
    }

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    info!("Starting mapfilter");
    run(Cli::parse())
}
