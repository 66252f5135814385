//! Environment overrides live in their own test binary: variables are
//! process-wide and would leak into the other config tests.

use std::fs;

use tempfile::TempDir;

use response_combiner::config::{local_config_path, Settings};

#[test]
fn given_env_var_and_local_config_when_load_then_env_wins() {
    let run_dir = TempDir::new().unwrap();
    fs::write(local_config_path(run_dir.path()), "value_precision = 3\n").unwrap();
    std::env::set_var("RESPCOMB_VALUE_PRECISION", "8");

    let settings = Settings::load(Some(run_dir.path()));
    std::env::remove_var("RESPCOMB_VALUE_PRECISION");

    assert_eq!(settings.unwrap().value_precision, 8);
}
