use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use faceform_core::{Analyzer, FaceMeshDetector, Outcome, RuleTable};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod config;
mod engine;
mod report;

use config::Config;
use engine::EngineHandle;

#[derive(Parser)]
#[command(name = "faceform", about = "Face-shape analysis and haircut recommendations")]
struct Cli {
    /// Rule table TOML (overrides FACEFORM_RULES_PATH; defaults to the built-in table)
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one or more photos
    Analyze {
        /// Photos to analyze (JPEG, PNG, ...)
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
        /// Write annotated landmark images into this directory
        #[arg(long)]
        overlay_dir: Option<PathBuf>,
    },
    /// Validate and print the rule table
    Rules,
    /// Show the description and haircuts for a face shape
    Recommend {
        /// Face shape name (e.g. OVAL, ROUND); unknown names show OVAL
        shape: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let rules = Arc::new(load_rules(cli.rules.as_deref().or(config.rules_path.as_deref()))?);

    match cli.command {
        Commands::Analyze {
            images,
            json,
            overlay_dir,
        } => {
            let detector_path = config.face_detector_model_path();
            let mesh_path = config.face_mesh_model_path();
            let detector = FaceMeshDetector::load(&detector_path, &mesh_path, config.face_threshold)
                .with_context(|| format!("loading models from {}", config.model_dir.display()))?;
            tracing::info!(detector = %detector_path, mesh = %mesh_path, "face mesh detector loaded");

            let analyzer = Analyzer::new(detector, rules)
                .with_overlay(config.overlay_enabled && overlay_dir.is_some());
            let handle = engine::spawn_engine(analyzer, config.queue_depth)?;

            if let Some(dir) = &overlay_dir {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating overlay directory {}", dir.display()))?;
            }

            let tasks: Vec<_> = images
                .into_iter()
                .map(|path| {
                    let handle = handle.clone();
                    tokio::spawn(async move {
                        let result = analyze_file(&handle, &path).await;
                        (path, result)
                    })
                })
                .collect();

            for task in tasks {
                let (path, result) = task.await?;
                print_result(&path, &result, json, overlay_dir.as_deref());
            }
        }
        Commands::Rules => {
            for (i, entry) in rules.entries().iter().enumerate() {
                println!(
                    "{}. {:<7} w/l [{:.2}, {:.2}]  f/j [{:.2}, {:.2}]  c/j [{:.2}, {:.2}]",
                    i + 1,
                    entry.shape,
                    entry.width_to_length.low,
                    entry.width_to_length.high,
                    entry.forehead_to_jawline.low,
                    entry.forehead_to_jawline.high,
                    entry.cheekbone_to_jawline.low,
                    entry.cheekbone_to_jawline.high,
                );
            }
            let overlaps = rules.overlapping_pairs();
            if !overlaps.is_empty() {
                println!();
                println!("Overlapping entries (earlier entry wins):");
                for (first, second) in overlaps {
                    println!("  {first} before {second}");
                }
            }
        }
        Commands::Recommend { shape } => {
            let rec = faceform_core::recommendations_by_name(&rules, &shape);
            println!("{}", report::render_recommendation(&rec));
        }
    }

    Ok(())
}

fn load_rules(path: Option<&Path>) -> Result<RuleTable> {
    let table = match path {
        Some(path) => RuleTable::load(path)?,
        None => RuleTable::builtin().context("built-in rule table is invalid")?,
    };
    tracing::info!(entries = table.len(), "rule table ready");
    Ok(table)
}

async fn analyze_file(handle: &EngineHandle, path: &Path) -> Result<Outcome> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(handle.analyze(bytes).await?)
}

fn print_result(
    path: &Path,
    result: &Result<Outcome>,
    json: bool,
    overlay_dir: Option<&Path>,
) {
    if let (Ok(Outcome::Face(analysis)), Some(dir)) = (result, overlay_dir) {
        if let Some(bytes) = &analysis.overlay {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("photo");
            let out = dir.join(format!("{stem}_analysis.jpg"));
            match std::fs::write(&out, bytes) {
                Ok(()) => tracing::info!(path = %out.display(), "overlay written"),
                Err(e) => tracing::warn!(path = %out.display(), error = %e, "failed to write overlay"),
            }
        }
    }

    if json {
        let value = match result {
            Ok(Outcome::Face(analysis)) => serde_json::json!({
                "image": path.display().to_string(),
                "status": "face",
                "analysis": analysis,
            }),
            Ok(Outcome::NoFaceDetected) => serde_json::json!({
                "image": path.display().to_string(),
                "status": "no_face",
            }),
            Err(e) => serde_json::json!({
                "image": path.display().to_string(),
                "status": "error",
                "error": format!("{e:#}"),
            }),
        };
        println!("{value}");
        return;
    }

    println!("== {}", path.display());
    match result {
        Ok(Outcome::Face(analysis)) => println!("{}", report::render_analysis(analysis)),
        Ok(Outcome::NoFaceDetected) => println!("{}", report::NO_FACE),
        Err(e) => {
            tracing::error!(image = %path.display(), error = ?e, "photo analysis failed");
            println!("{}", report::FAILURE);
        }
    }
    println!();
}
