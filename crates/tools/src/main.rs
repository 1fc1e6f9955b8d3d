use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use editor::EditorConfig;
use foundation::math::{
    Crs, Ecef, Hpr, HprDegrees, Quat, catalog, orientation_ecef_to_local_hpr, orientation_local_hpr_to_ecef,
};
use scene::{SceneCollections, SceneStore, SelectedEntity, SelectedObject};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Coordinate and scene utilities for the atlas scene editor")]
struct Args {
    /// Editor config file (JSON). Defaults come from ATLAS_* environment variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the supported coordinate reference systems
    Crs,

    /// Convert coordinates in a CRS to ECEF
    Project {
        #[arg(long)]
        crs: String,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        #[arg(allow_negative_numbers = true)]
        z: f64,
    },

    /// Convert ECEF coordinates into a CRS
    Unproject {
        #[arg(long)]
        crs: String,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        #[arg(allow_negative_numbers = true)]
        z: f64,
    },

    /// Heading/pitch/roll (degrees) at an ECEF origin to an ECEF quaternion
    HprToQuat {
        /// ECEF origin: X,Y,Z
        #[arg(long, allow_hyphen_values = true)]
        origin: String,
        #[arg(allow_negative_numbers = true)]
        heading: f64,
        #[arg(allow_negative_numbers = true)]
        pitch: f64,
        #[arg(allow_negative_numbers = true)]
        roll: f64,
    },

    /// ECEF quaternion (x y z w) to heading/pitch/roll (degrees) at an ECEF origin
    QuatToHpr {
        /// ECEF origin: X,Y,Z
        #[arg(long, allow_hyphen_values = true)]
        origin: String,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        #[arg(allow_negative_numbers = true)]
        z: f64,
        #[arg(allow_negative_numbers = true)]
        w: f64,
    },

    /// Load a scene file into a store and print a summary
    Scene { file: PathBuf },
}

/// On-disk scene: the four collections plus an optional selection.
#[derive(Debug, Default, Deserialize)]
struct SceneFile {
    #[serde(flatten)]
    collections: SceneCollections,
    #[serde(default)]
    selected: Option<SelectedObject>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let out = match args.command {
        Command::Crs => cmd_crs(),
        Command::Project { crs, x, y, z } => cmd_project(&crs, [x, y, z])?,
        Command::Unproject { crs, x, y, z } => cmd_unproject(&crs, [x, y, z])?,
        Command::HprToQuat {
            origin,
            heading,
            pitch,
            roll,
        } => cmd_hpr_to_quat(&origin, HprDegrees::new(heading, pitch, roll))?,
        Command::QuatToHpr { origin, x, y, z, w } => cmd_quat_to_hpr(&origin, Quat::new(x, y, z, w))?,
        Command::Scene { file } => cmd_scene(&file, &config)?,
    };
    print!("{out}");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig, String> {
    match path {
        Some(p) => {
            let text = fs::read_to_string(p).map_err(|e| format!("read {p:?}: {e}"))?;
            EditorConfig::from_json_str(&text).map_err(|e| format!("{p:?}: {e}"))
        }
        None => Ok(EditorConfig::from_env()),
    }
}

fn parse_origin(s: &str) -> Result<Ecef, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("origin {s:?}: {e}"))?;
    match parts.as_slice() {
        [x, y, z] => Ok(Ecef::new(*x, *y, *z)),
        _ => Err(format!("origin {s:?}: expected X,Y,Z")),
    }
}

fn cmd_crs() -> String {
    catalog()
        .into_iter()
        .map(|info| format!("{}\t{}\n", info.code, info.name))
        .collect()
}

fn cmd_project(code: &str, p: [f64; 3]) -> Result<String, String> {
    let crs = Crs::from_code(code).map_err(|e| e.to_string())?;
    let ecef = crs.forward(p).map_err(|e| e.to_string())?;
    Ok(format!("{:.4}\t{:.4}\t{:.4}\n", ecef.x, ecef.y, ecef.z))
}

fn cmd_unproject(code: &str, p: [f64; 3]) -> Result<String, String> {
    let crs = Crs::from_code(code).map_err(|e| e.to_string())?;
    let [x, y, z] = crs.inverse(Ecef::from_array(p)).map_err(|e| e.to_string())?;
    let decimals = if crs.is_geographic() { 9 } else { 4 };
    Ok(format!("{x:.decimals$}\t{y:.decimals$}\t{z:.4}\n"))
}

fn cmd_hpr_to_quat(origin: &str, hpr: HprDegrees) -> Result<String, String> {
    let origin = parse_origin(origin)?;
    let q = orientation_local_hpr_to_ecef(Hpr::from_degrees(hpr), origin).map_err(|e| e.to_string())?;
    Ok(format!("{:.9}\t{:.9}\t{:.9}\t{:.9}\n", q.x, q.y, q.z, q.w))
}

fn cmd_quat_to_hpr(origin: &str, q: Quat) -> Result<String, String> {
    let origin = parse_origin(origin)?;
    let hpr = orientation_ecef_to_local_hpr(q, origin)
        .map_err(|e| e.to_string())?
        .to_degrees();
    Ok(format!("{:.6}\t{:.6}\t{:.6}\n", hpr.heading, hpr.pitch, hpr.roll))
}

fn load_scene(text: &str, config: &EditorConfig) -> Result<SceneStore, String> {
    let file: SceneFile = serde_json::from_str(text).map_err(|e| format!("parse scene: {e}"))?;
    let mut store = SceneStore::with_limits(config.history_limit, config.event_retention);
    store.load(file.collections).map_err(|e| e.to_string())?;
    store.set_selected_object(file.selected);
    Ok(store)
}

fn summarize(store: &SceneStore) -> String {
    let mut out = String::new();
    out.push_str(&format!("clipping polygons\t{}\n", store.clipping_polygons().len()));
    out.push_str(&format!("project objects\t{}\n", store.project_objects().len()));
    out.push_str(&format!("starting points\t{}\n", store.starting_points().len()));
    out.push_str(&format!("visual axes\t{}\n", store.visual_axes().len()));
    let selected = match store.selected() {
        Some(SelectedEntity::ClippingPolygon(e)) => e.name.clone(),
        Some(SelectedEntity::ProjectObject(e)) => e.name.clone(),
        Some(SelectedEntity::StartingPoint(e)) => e.name.clone(),
        Some(SelectedEntity::VisualAxis(e)) => e.name.clone(),
        Some(SelectedEntity::Tile3d(f)) => format!("tile feature {}", f.id),
        None => "-".to_string(),
    };
    out.push_str(&format!("selected\t{selected}\n"));
    out
}

fn cmd_scene(path: &Path, config: &EditorConfig) -> Result<String, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("read {path:?}: {e}"))?;
    let store = load_scene(&text, config)?;
    info!(entities = store.collections().total(), "scene loaded");
    Ok(summarize(&store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_subcommands_with_negative_numbers() {
        let args = Args::try_parse_from(["atlas-scene", "project", "--crs", "EPSG:4326", "-122.4", "37.8", "-5"])
            .unwrap();
        match args.command {
            Command::Project { crs, x, y, z } => {
                assert_eq!(crs, "EPSG:4326");
                assert_eq!([x, y, z], [-122.4, 37.8, -5.0]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn project_then_unproject() {
        let ecef = cmd_project("4326", [0.0, 0.0, 0.0]).unwrap();
        assert_eq!(ecef, "6378137.0000\t0.0000\t0.0000\n");
        let geo = cmd_unproject("EPSG:4326", [6_378_137.0, 0.0, 0.0]).unwrap();
        assert_eq!(geo, "0.000000000\t0.000000000\t0.0000\n");
        assert!(cmd_project("EPSG:1", [0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn hpr_commands_report_degenerate_origin() {
        assert!(cmd_hpr_to_quat("0,0,0", HprDegrees::new(0.0, 0.0, 0.0)).is_err());
        assert!(parse_origin("1,2").is_err());
        let q = cmd_hpr_to_quat("6378137,0,0", HprDegrees::new(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(q.split('\t').count(), 4);
    }

    #[test]
    fn catalog_lists_known_codes() {
        let listing = cmd_crs();
        assert!(listing.contains("EPSG:2056\tCH1903+ / LV95\n"));
        assert!(listing.contains("EPSG:4978"));
    }

    #[test]
    fn scene_summary_resolves_selection() {
        let text = r#"{
            "starting_points": [
                {"id": "sp-1", "name": "Overview", "visible": true,
                 "position": {"x": 6378237.0, "y": 0.0, "z": 0.0},
                 "target": {"x": 6378137.0, "y": 0.0, "z": 0.0}}
            ],
            "selected": {"type": "entity", "kind": "starting_point", "id": "sp-1"}
        }"#;
        let store = load_scene(text, &EditorConfig::default()).unwrap();
        assert_eq!(
            summarize(&store),
            "clipping polygons\t0\nproject objects\t0\nstarting points\t1\nvisual axes\t0\nselected\tOverview\n"
        );
        assert_eq!(store.history().index(), 1);
    }

    #[test]
    fn duplicate_ids_fail_to_load() {
        let point = r#"{"id": "a", "name": "p", "visible": true,
            "position": {"x": 0.0, "y": 0.0, "z": 0.0}, "target": {"x": 0.0, "y": 0.0, "z": 0.0}}"#;
        let text = format!(r#"{{"visual_axes": [{point}, {point}]}}"#);
        assert!(load_scene(&text, &EditorConfig::default()).is_err());
    }
}
