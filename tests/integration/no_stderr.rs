// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests to ensure there is no stderr output for successful commands.

use tempfile::TempDir;

use crate::{get_cmd_output, small_simulate_args, stefcal};

#[test]
fn test_simulate_no_stderr() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let sols = tmp_dir.path().join("sols.json");
    let sols = sols.display().to_string();

    let mut args = small_simulate_args();
    args.extend(["--output-solutions", &sols]);
    let cmd = stefcal().args(&args).ok();
    assert!(
        cmd.is_ok(),
        "simulate failed on a small setup: {}",
        cmd.err().unwrap()
    );
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
}
