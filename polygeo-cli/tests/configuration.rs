//! Store location resolution through the environment, run against the built
//! binary.

use std::{
    path::Path,
    process::{Command, Output},
};

use rstest::{fixture, rstest};
use tempfile::TempDir;

const STORE_FILES: [&str; 3] = ["dados_estruturados.db", "locais_geo.db", "locais_geo.2dsphere"];

struct Dirs {
    workdir: TempDir,
    configured: TempDir,
}

#[fixture]
fn dirs() -> Dirs {
    Dirs {
        workdir: TempDir::new().expect("create working dir"),
        configured: TempDir::new().expect("create configured dir"),
    }
}

fn polygeo(workdir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_polygeo"));
    command
        .current_dir(workdir)
        .env_remove("POLYGEO_DATA_DIR")
        .env_remove("POLYGEO_TIMEOUT_MS");
    command
}

fn succeed(command: &mut Command) -> Output {
    let output = command.output().expect("run polygeo");
    assert!(
        output.status.success(),
        "polygeo failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn holds_stores(dir: &Path) -> bool {
    STORE_FILES.iter().all(|name| dir.join(name).is_file())
}

fn holds_no_stores(dir: &Path) -> bool {
    STORE_FILES.iter().all(|name| !dir.join(name).exists())
}

#[rstest]
fn data_dir_comes_from_the_environment(dirs: Dirs) {
    succeed(
        polygeo(dirs.workdir.path())
            .env("POLYGEO_DATA_DIR", dirs.configured.path())
            .arg("seed"),
    );

    assert!(holds_stores(dirs.configured.path()));
    assert!(holds_no_stores(dirs.workdir.path()));

    let output = succeed(
        polygeo(dirs.workdir.path())
            .env("POLYGEO_DATA_DIR", dirs.configured.path())
            .arg("cities"),
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("Recife (PE)"));
}

#[rstest]
fn data_dir_flag_overrides_the_environment(dirs: Dirs) {
    let flagged = dirs.workdir.path().join("flagged");
    succeed(
        polygeo(dirs.workdir.path())
            .env("POLYGEO_DATA_DIR", dirs.configured.path())
            .arg("--data-dir")
            .arg(&flagged)
            .arg("seed"),
    );

    assert!(holds_stores(&flagged));
    assert!(holds_no_stores(dirs.configured.path()));
}

#[rstest]
fn malformed_timeout_in_the_environment_is_reported(dirs: Dirs) {
    let output = polygeo(dirs.workdir.path())
        .env("POLYGEO_TIMEOUT_MS", "soon")
        .arg("cities")
        .output()
        .expect("run polygeo");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load configuration"));
    assert!(holds_no_stores(dirs.workdir.path()));
}
