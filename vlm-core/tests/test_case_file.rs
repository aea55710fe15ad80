//! Case file workflow
//!
//! A case written with `save_config` runs through `VlmSolver::from_case_file`
//! with paths resolved against the case directory.

use std::path::PathBuf;

use vortex_lattice::core::config::{GeometrySource, WakeConfig, save_config};
use vortex_lattice::core::io::{load_restart, save_panel_loads, save_span_loads, save_status};
use vortex_lattice::{CaseConfig, SymmetryPlane, VlmSolver};

fn case_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("vortex-lattice-tests").join(name);
    std::fs::create_dir_all(&dir).expect("Failed to create output directory");
    dir
}

#[test]
fn test_case_file_run() {
    let dir = case_dir("case_file");
    let mut config = CaseConfig {
        case_id: "json_wing".into(),
        geometry: Some(GeometrySource::RectangularWing {
            chord: 1.0,
            semi_span: 1.0,
            n_chord: 3,
            n_span: 6,
            full_span: false,
            cosine_span: true,
        }),
        symmetry: Some(SymmetryPlane::Y),
        wake: WakeConfig {
            trailing_nodes: 6,
            relax_iterations: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    config.flight.alpha_deg = 4.0;
    config.restart.save = Some(PathBuf::from("wing.vlmrst"));
    let case_path = dir.join("wing.json");
    save_config(&config, &case_path).unwrap();

    let mut solver = VlmSolver::from_case_file(&case_path).unwrap();
    assert_eq!(solver.model().num_loops(), 18);
    let report = solver.solve().unwrap();
    assert!(report.coefficients.cl > 0.0);

    // Relative restart path lands next to the case file
    let restart = load_restart(dir.join("wing.vlmrst")).unwrap();
    assert_eq!(restart.case_id, "json_wing");
    assert_eq!(restart.circulation.len(), 18);

    let json = report.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["header"]["case_id"], "json_wing");
    assert_eq!(value["history"].as_array().map(|h| h.len()), Some(2));
    assert!(value["forces"]["span_loads"][0]["stations"].is_array());

    let status_path = dir.join("wing.status");
    save_status(&status_path, &report.header, &report.history).unwrap();
    let status = std::fs::read_to_string(&status_path).unwrap();
    assert_eq!(status.lines().count(), 4 + report.history.len());

    // Span table: case line, then sheet line, column header and one row per strip
    let span_path = dir.join("wing.span");
    save_span_loads(&span_path, &report.header, &report.forces.span_loads).unwrap();
    let span = std::fs::read_to_string(&span_path).unwrap();
    let strips: usize = report.forces.span_loads.iter().map(|l| l.stations.len() + 2).sum();
    assert_eq!(span.lines().count(), 1 + strips);

    let panel_path = dir.join("wing.loads");
    let q = solver.config().flight.dynamic_pressure();
    save_panel_loads(&panel_path, &report.header, solver.model(), q).unwrap();
    let panels = std::fs::read_to_string(&panel_path).unwrap();
    assert_eq!(panels.lines().count(), 3 + 18);
    let lift: f64 = panels
        .lines()
        .skip(3)
        .map(|r| r.split_whitespace().last().unwrap().parse::<f64>().unwrap())
        .sum();
    assert!(lift > 0.0);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_missing_geometry_is_a_configuration_error() {
    let dir = case_dir("no_geometry");
    let case_path = dir.join("empty.json");
    save_config(&CaseConfig::default(), &case_path).unwrap();
    assert!(VlmSolver::from_case_file(&case_path).is_err());
    std::fs::remove_dir_all(&dir).ok();
}
