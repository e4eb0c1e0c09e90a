// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::io::Write;

use indoc::indoc;
use tempfile::TempDir;

use super::*;

fn small_args() -> SimulateArgs {
    SimulateArgs {
        args_file: None,
        solver_args: SolverArgs {
            datashape: Some(vec![2, 4]),
            subtiling: Some(vec![1, 2]),
            epsilon: Some(1e-9),
            max_iterations: Some(500),
            ..Default::default()
        },
        simulate_args: SimulateCliArgs {
            num_antennas: Some(5),
            num_tiles: Some(2),
            ..Default::default()
        },
    }
}

#[test]
fn test_parse_defaults() {
    let (params, output) = SimulateArgs::default().parse().unwrap();
    assert!(output.is_none());
    assert_eq!(params.num_antennas, DEFAULT_NUM_ANTENNAS);
    assert_eq!(params.num_tiles, DEFAULT_NUM_TILES);
    assert_eq!(params.amplitude_scatter, DEFAULT_AMPLITUDE_SCATTER);
    assert_eq!(params.phase_scatter, DEFAULT_PHASE_SCATTER);
    assert_eq!(params.solver, StefCalParams::new(DEFAULT_DATASHAPE.to_vec()));
}

#[test]
fn test_cli_parsing() {
    let args = SimulateArgs::try_parse_from([
        "simulate",
        "-n",
        "6",
        "--datashape",
        "2",
        "8",
        "--subtiling",
        "1",
        "4",
        "--conv-quota",
        "0.5",
    ])
    .unwrap();
    assert_eq!(args.simulate_args.num_antennas, Some(6));
    assert_eq!(args.solver_args.datashape, Some(vec![2, 8]));
    assert_eq!(args.solver_args.subtiling, Some(vec![1, 4]));

    let (params, _) = args.parse().unwrap();
    assert_eq!(params.solver.conv_quota, 0.5);
    assert_eq!(params.solver.tile_shape().unwrap().gainshape(), &[2, 2]);
}

#[test]
fn test_cli_args_override_toml_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let file = tmp_dir.path().join("args.toml");
    let mut f = File::create(&file).unwrap();
    f.write_all(
        indoc! {r#"
            [solver]
            datashape = [2, 4]
            epsilon = 1e-8

            [simulate]
            num_antennas = 5
            num_tiles = 3
        "#}
        .as_bytes(),
    )
    .unwrap();
    drop(f);

    let cli_args = SimulateArgs {
        args_file: Some(file),
        solver_args: SolverArgs {
            epsilon: Some(1e-9),
            ..Default::default()
        },
        simulate_args: SimulateCliArgs {
            num_tiles: Some(1),
            ..Default::default()
        },
    };
    let merged = cli_args.merge().unwrap();
    assert!(merged.args_file.is_none());
    assert_eq!(merged.solver_args.datashape, Some(vec![2, 4]));
    assert_eq!(merged.solver_args.epsilon, Some(1e-9));
    assert_eq!(merged.simulate_args.num_antennas, Some(5));
    assert_eq!(merged.simulate_args.num_tiles, Some(1));
}

#[test]
fn test_json_args_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let file = tmp_dir.path().join("args.json");
    std::fs::write(
        &file,
        indoc! {r#"
            {
                "solver": { "subtiling": [1, 4] },
                "simulate": { "phase_scatter": 0.1 }
            }
        "#},
    )
    .unwrap();

    let merged = SimulateArgs {
        args_file: Some(file),
        ..Default::default()
    }
    .merge()
    .unwrap();
    assert_eq!(merged.solver_args.subtiling, Some(vec![1, 4]));
    assert_eq!(merged.simulate_args.phase_scatter, Some(0.1));
    assert_eq!(merged.simulate_args.num_antennas, None);
}

#[test]
fn test_unrecognised_args_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let file = tmp_dir.path().join("args.yaml");
    std::fs::write(&file, "solver: {}").unwrap();

    let result = SimulateArgs {
        args_file: Some(file),
        ..Default::default()
    }
    .merge();
    assert!(matches!(result, Err(StefcalError::ArgFile(_))));
}

#[test]
fn test_output_must_be_json() {
    let mut args = small_args();
    args.simulate_args.output_solutions = Some(PathBuf::from("sols.fits"));
    assert!(matches!(
        args.parse(),
        Err(SimulateArgsError::OutputNotJson(_))
    ));

    let mut args = small_args();
    args.simulate_args.output_solutions = Some(PathBuf::from("sols.JSON"));
    assert!(args.parse().is_ok());
}

#[test]
fn test_bad_solver_args() {
    let mut args = small_args();
    args.solver_args.subtiling = Some(vec![3, 2]);
    assert!(matches!(args.parse(), Err(SimulateArgsError::Params(_))));

    let mut args = small_args();
    args.solver_args.epsilon = Some(-1.0);
    let result = args.run(true, false);
    assert!(matches!(result, Err(StefcalError::Params(_))));
}

#[test]
fn test_dry_run_writes_nothing() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let output = tmp_dir.path().join("sols.json");
    let mut args = small_args();
    args.simulate_args.output_solutions = Some(output.clone());
    args.run(true, false).unwrap();
    assert!(!output.exists());
}

#[test]
fn test_run_writes_solutions() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let output = tmp_dir.path().join("sols.json");
    let mut args = small_args();
    args.simulate_args.output_solutions = Some(output.clone());
    args.run(false, false).unwrap();

    let contents = std::fs::read_to_string(&output).unwrap();
    let sols: SolutionsOutput = serde_json::from_str(&contents).unwrap();
    assert_eq!(sols.params.datashape, vec![2, 4]);
    assert_eq!(sols.baselines.len(), 10);
    assert_eq!(sols.tiles.len(), 2);
    for tile in &sols.tiles {
        assert!(tile.result.converged, "{:?}", tile.result);
        assert!(tile.residual_rms < 1e-6, "{}", tile.residual_rms);
        // 5 antennas, 2 polarisations.
        assert_eq!(tile.gains.len(), 10);
        for gain in &tile.gains {
            assert_eq!(gain.shape, vec![2, 2]);
            assert_eq!(gain.values.len(), 4);
        }
    }
}
