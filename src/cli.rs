use crate::binding;
use crate::config::load_config;
use crate::route::{ElbowArrowUpdates, RouteOptions, update_elbow_arrow_points, validate_elbow_points};
use crate::scene::{Element, Scene};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "ortr", version, about = "Re-route elbow connectors in a whiteboard scene")]
pub struct Args {
    /// Input scene file (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON/JSON5 file with routing overrides
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Validate elbow arrow orthogonality instead of writing output
    #[arg(long = "check")]
    pub check: bool,
}

pub fn run() -> Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let input = read_input(args.input.as_deref())?;
    let mut scene: Scene =
        serde_json::from_str(&input).context("scene is not a valid element array")?;

    if args.check {
        let mut bad = 0usize;
        for element in scene.elements() {
            if let Element::Arrow(arrow) = element
                && arrow.elbowed
                && !validate_elbow_points(&arrow.points, config.dedup_threshold)
            {
                eprintln!("non-orthogonal elbow arrow: {}", arrow.id);
                bad += 1;
            }
        }
        if bad > 0 {
            anyhow::bail!("{bad} elbow arrow(s) failed validation");
        }
        return Ok(());
    }

    let rerouted = reroute_scene(&mut scene, &config)?;
    tracing::debug!(rerouted, "scene processed");

    let json = serde_json::to_string_pretty(&scene)?;
    write_output(&json, args.output.as_deref())?;
    Ok(())
}

/// Re-route every elbow arrow in the scene against the current element
/// positions, refreshing bindings as a side effect.
fn reroute_scene(scene: &mut Scene, config: &crate::config::RoutingConfig) -> Result<usize> {
    let arrow_ids: Vec<String> = scene
        .elements()
        .filter_map(Element::as_arrow)
        .filter(|arrow| arrow.elbowed)
        .map(|arrow| arrow.id.clone())
        .collect();

    let mut rerouted = 0usize;
    for id in &arrow_ids {
        let Some(arrow) = scene.get_arrow(id).cloned() else {
            continue;
        };
        if arrow.points.len() < 2 {
            continue;
        }
        let updates = ElbowArrowUpdates {
            points: Some(vec![
                arrow.points[0],
                arrow.points[arrow.points.len() - 1],
            ]),
            fixed_segments: None,
            start_binding: None,
            end_binding: None,
        };
        let update =
            update_elbow_arrow_points(&arrow, scene, updates, &RouteOptions::default(), config, None)
                .with_context(|| format!("arrow {id}"))?;
        if !update.is_empty() {
            scene.commit_arrow(id, update);
            rerouted += 1;
        }
    }

    // Drop bindings that point at elements no longer in the scene.
    let stale: Vec<String> = scene
        .elements()
        .filter_map(Element::as_arrow)
        .flat_map(|arrow| [&arrow.start_binding, &arrow.end_binding])
        .flatten()
        .map(|binding| binding.element_id.clone())
        .filter(|id| scene.get_shape(id).is_none())
        .collect();
    let stale_refs: Vec<&str> = stale.iter().map(String::as_str).collect();
    binding::fix_bindings_after_deletion(scene, &stale_refs);

    Ok(rerouted)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
        }
        _ => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn write_output(json: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_json_roundtrip() {
        let json = r#"[
            {"id":"r1","kind":"rectangle","x":0,"y":0,"width":100,"height":100},
            {"id":"a1","x":120,"y":50,"points":[[0,0],[80,0]],"elbowed":true}
        ]"#;
        let scene: Scene = serde_json::from_str(json).unwrap();
        assert!(scene.get_shape("r1").is_some());
        assert!(scene.get_arrow("a1").is_some());
        let out = serde_json::to_string(&scene).unwrap();
        let back: Scene = serde_json::from_str(&out).unwrap();
        assert_eq!(back.len(), 2);
    }
}
