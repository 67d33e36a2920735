//! Barrido a través de `run_file`: reanudación tras un fallo y política de
//! parada.
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

use sweepflow::{run_file, FailurePolicy, SweepError, SweepOptions};

/// Config cuyo step `sim` falla mientras exista `<root>/broken`.
fn write_config(root: &Path) -> PathBuf {
    let template = root.join("card.tpl");
    fs::write(&template, "MASS .M.\n").unwrap();
    let broken = root.join("broken");
    let config = json!({
        "topology": "GG",
        "energy": 13.6,
        "workdir": root.join("runs").to_string_lossy(),
        "parameter_space": {"M": {"min": 1000, "max": 1400, "step": 200}, "WIDTH": {"value": 1.5}},
        "workflow": ["card", "sim"],
        "steps": {
            "card": {"uses": "template", "template": template, "results_dir": null},
            "sim": {
                "uses": "command",
                "program": "sh",
                "args": ["-c", format!("test ! -e {} && cat {{input}} > {{output}}", broken.display())],
                "output": "sim.out",
                "requires_input": true
            }
        }
    });
    let path = root.join("sweep.json");
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

#[test]
fn failed_sweep_resumes_from_the_failing_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path());
    fs::write(dir.path().join("broken"), "").unwrap();

    let first = run_file(&path, SweepOptions::default()).unwrap();
    assert_eq!(first.failed(), 3);
    assert!(!first.is_success());
    for point in &first.points {
        assert_eq!(point.artifacts.len(), 1, "the card is written before sim fails");
    }

    fs::remove_file(dir.path().join("broken")).unwrap();
    let second = run_file(&path, SweepOptions::default()).unwrap();
    assert!(second.is_success());
    for point in &second.points {
        assert_eq!(point.skipped, vec!["card"]);
    }
    let sim = dir.path().join("runs").join("GG.1200p0_1p5.13p6").join("sim").join("sim.out");
    assert_eq!(fs::read_to_string(sim).unwrap(), "MASS 1.20000000E+03\n");
    assert_eq!(first.definition_hash, second.definition_hash);
}

#[test]
fn stop_on_error_with_one_worker_cancels_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path());
    fs::write(dir.path().join("broken"), "").unwrap();

    let options = SweepOptions { parallelism: Some(1),
                                 policy: FailurePolicy::StopOnError,
                                 retries: 0 };
    let report = run_file(&path, options).unwrap();
    assert_eq!(report.failed(), 1);
    assert_eq!(report.cancelled(), 2);
}

#[test]
fn invalid_configuration_is_reported_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, r#"{"topology": "GG", "energy": 13, "workflow": ["card"]}"#).unwrap();
    assert!(matches!(run_file(&path, SweepOptions::default()), Err(SweepError::Configuration(_))));
    assert!(matches!(run_file(dir.path().join("missing.json"), SweepOptions::default()), Err(SweepError::Configuration(_))));
}
