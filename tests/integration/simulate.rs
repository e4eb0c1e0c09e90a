// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::Path;

use indoc::indoc;
use serde_json::Value;
use tempfile::TempDir;

use crate::{get_cmd_output, small_simulate_args, stefcal};

fn read_solutions(file: &Path) -> Value {
    let contents = std::fs::read_to_string(file).unwrap();
    serde_json::from_str(&contents).unwrap()
}

#[test]
fn test_simulate_calibrates() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let sols = tmp_dir.path().join("sols.json");
    let sols_str = sols.display().to_string();

    let mut args = small_simulate_args();
    args.extend(["-o", &sols_str]);
    let cmd = stefcal().args(&args).ok();
    assert!(cmd.is_ok(), "simulate failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Tile   0: converged"), "{stdout}");
    assert!(stdout.contains("Tile   1: converged"), "{stdout}");
    assert!(stdout.contains("stefcal simulate complete."), "{stdout}");

    let sols = read_solutions(&sols);
    assert_eq!(sols["params"]["datashape"], serde_json::json!([2, 4]));
    assert_eq!(sols["params"]["subtiling"], serde_json::json!([1, 2]));
    let tiles = sols["tiles"].as_array().unwrap();
    assert_eq!(tiles.len(), 2);
    for tile in tiles {
        assert_eq!(tile["converged"], Value::Bool(true));
        assert!(tile["residual_rms"].as_f64().unwrap() < 1e-6);
        let gains = tile["gains"].as_array().unwrap();
        assert_eq!(gains.len(), 10);
        assert_eq!(gains[0]["antenna"], 0);
        assert_eq!(gains[0]["pol"], "X");
        assert_eq!(gains[1]["pol"], "Y");
        assert_eq!(gains[0]["shape"], serde_json::json!([2, 2]));
    }
}

#[test]
fn test_dry_run() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let sols = tmp_dir.path().join("sols.json");
    let sols_str = sols.display().to_string();

    let mut args = small_simulate_args();
    args.extend(["--output-solutions", &sols_str, "--dry-run"]);
    let cmd = stefcal().args(&args).ok();
    assert!(cmd.is_ok(), "dry run failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Dry run -- exiting now."), "{stdout}");
    assert!(!sols.exists());
}

#[test]
fn test_arguments_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let args_file = tmp_dir.path().join("args.toml");
    let sols = tmp_dir.path().join("sols.json");
    std::fs::write(
        &args_file,
        format!(
            indoc! {r#"
                [solver]
                datashape = [2, 4]
                subtiling = [2, 2]
                epsilon = 1e-9
                max_iterations = 500

                [simulate]
                num_antennas = 4
                num_tiles = 1
                output_solutions = "{}"
            "#},
            sols.display()
        ),
    )
    .unwrap();

    let args_file_str = args_file.display().to_string();
    // The CLI overrides the file.
    #[rustfmt::skip]
    let cmd = stefcal()
        .args([
            "simulate", &args_file_str,
            "--no-progress-bars",
            "--num-tiles", "2",
        ])
        .ok();
    assert!(cmd.is_ok(), "simulate failed: {}", cmd.err().unwrap());

    let sols = read_solutions(&sols);
    let tiles = sols["tiles"].as_array().unwrap();
    assert_eq!(tiles.len(), 2);
    // 4 antennas, 2 polarisations, and one gain per 2x2 block.
    assert_eq!(tiles[0]["gains"].as_array().unwrap().len(), 8);
    assert_eq!(tiles[0]["gains"][0]["shape"], serde_json::json!([1, 2]));
}

#[test]
fn test_save_toml() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let toml = tmp_dir.path().join("saved.toml");
    let toml_str = toml.display().to_string();

    let mut args = small_simulate_args();
    args.extend(["--save-toml", &toml_str, "--dry-run"]);
    let cmd = stefcal().args(&args).ok();
    assert!(cmd.is_ok(), "simulate failed: {}", cmd.err().unwrap());

    let contents = std::fs::read_to_string(&toml).unwrap();
    assert!(contents.contains("[solver]"), "{contents}");
    assert!(contents.contains("num_antennas = 5"), "{contents}");

    // The saved file reproduces the run.
    let cmd = stefcal()
        .args(["simulate", &toml_str, "--dry-run"])
        .ok();
    assert!(cmd.is_ok(), "simulate failed: {}", cmd.err().unwrap());
}

#[test]
fn test_bad_subtiling_fails() {
    #[rustfmt::skip]
    let cmd = stefcal()
        .args([
            "simulate",
            "--no-progress-bars",
            "--datashape", "4", "6",
            "--subtiling", "3", "3",
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.starts_with("Error:"), "{stderr}");
    assert!(stderr.contains("subtiling"), "{stderr}");
}

#[test]
fn test_output_must_be_json() {
    let mut args = small_simulate_args();
    args.extend(["-o", "sols.fits", "--dry-run"]);
    let cmd = stefcal().args(&args).ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains(".json"), "{stderr}");
}
