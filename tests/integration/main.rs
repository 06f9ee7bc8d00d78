//! Integration tests for crossenv

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn crossenv() -> Command {
        let mut cmd = cargo_bin_cmd!("crossenv");
        cmd.env_remove("CROSSENV_CONFIG")
            .env_remove("CROSSENV_DEFINITION");
        cmd
    }

    #[test]
    fn help_displays() {
        crossenv()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Cached cross-compilation build environments",
            ));
    }

    #[test]
    fn version_displays() {
        crossenv()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("crossenv"));
    }

    #[test]
    fn config_path() {
        crossenv()
            .args(["--no-local", "env", "config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        crossenv()
            .args(["--no-local", "env", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[toolchain]"));
    }

    #[test]
    fn completions_generate() {
        crossenv()
            .args(["env", "completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("crossenv"));
    }

    #[test]
    fn missing_subcommand_is_usage_error() {
        crossenv().assert().failure().code(2);
    }
}

/// End-to-end runs against a fake `docker` that records its arguments
#[cfg(unix)]
mod forward_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const FAKE_DOCKER: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_DOCKER_LOG"
case "$1" in
  build) [ -z "$FAKE_BUILD_FAIL" ] || { echo "build exploded" >&2; exit 1; } ;;
  run) exit "${FAKE_RUN_EXIT:-0}" ;;
esac
exit 0
"#;

    struct Project {
        root: TempDir,
        bin: TempDir,
    }

    impl Project {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            let bin = TempDir::new().unwrap();

            let docker = bin.path().join("docker");
            fs::write(&docker, FAKE_DOCKER).unwrap();
            fs::set_permissions(&docker, fs::Permissions::from_mode(0o755)).unwrap();

            fs::write(
                root.path().join(".crossenv.toml"),
                "[toolchain]\ndefinition = \"Dockerfile\"\nimage = \"test/armv7:latest\"\n",
            )
            .unwrap();
            fs::write(root.path().join("Dockerfile"), "FROM debian:bookworm\n").unwrap();

            Self { root, bin }
        }

        fn path(&self) -> &Path {
            self.root.path()
        }

        fn log(&self) -> PathBuf {
            self.bin.path().join("docker.log")
        }

        fn calls(&self) -> Vec<String> {
            fs::read_to_string(self.log())
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn builds(&self) -> usize {
            self.calls().iter().filter(|c| c.starts_with("build")).count()
        }

        fn crossenv(&self) -> Command {
            let path = format!(
                "{}:{}",
                self.bin.path().display(),
                std::env::var("PATH").unwrap_or_default()
            );
            let mut cmd = cargo_bin_cmd!("crossenv");
            cmd.current_dir(self.path())
                .env("PATH", path)
                .env("FAKE_DOCKER_LOG", self.log())
                .env("CROSSENV_CONFIG", self.bin.path().join("global.toml"))
                .env_remove("CROSSENV_DEFINITION")
                .env_remove("RUST_LOG")
                .args(["--engine", "docker"]);
            cmd
        }
    }

    #[test]
    fn first_run_provisions_then_forwards_with_target() {
        let project = Project::new();

        project
            .crossenv()
            .args(["build", "--release"])
            .assert()
            .success();

        assert_eq!(project.builds(), 1);
        let run = project
            .calls()
            .into_iter()
            .find(|c| c.starts_with("run"))
            .unwrap();
        assert!(run.contains("test/armv7:latest cargo build --target armv7-unknown-linux-gnueabihf --release"));

        assert!(project.path().join("Dockerfile.fingerprint").is_file());
        assert!(project.path().join("crossenv-run.sh").is_file());
    }

    #[test]
    fn unchanged_definition_is_not_rebuilt() {
        let project = Project::new();

        project.crossenv().arg("build").assert().success();
        project.crossenv().arg("test").assert().success();

        assert_eq!(project.builds(), 1);
    }

    #[test]
    fn changed_definition_is_rebuilt() {
        let project = Project::new();

        project.crossenv().arg("build").assert().success();
        fs::write(
            project.path().join("Dockerfile"),
            "FROM debian:bookworm\nRUN apt-get update\n",
        )
        .unwrap();
        project.crossenv().arg("build").assert().success();

        assert_eq!(project.builds(), 2);
    }

    #[test]
    fn rebuild_flag_forces_provisioning() {
        let project = Project::new();

        project.crossenv().args(["env", "provision"]).assert().success();
        project
            .crossenv()
            .args(["--rebuild", "env", "provision"])
            .assert()
            .success();

        assert_eq!(project.builds(), 2);
    }

    #[test]
    fn delegated_exit_code_passes_through() {
        let project = Project::new();

        project
            .crossenv()
            .env("FAKE_RUN_EXIT", "101")
            .arg("test")
            .assert()
            .code(101);
    }

    #[test]
    fn changed_image_tag_is_rebuilt() {
        let project = Project::new();

        project.crossenv().arg("build").assert().success();
        fs::write(
            project.path().join(".crossenv.toml"),
            "[toolchain]\ndefinition = \"Dockerfile\"\nimage = \"test/armv7:v2\"\n",
        )
        .unwrap();
        project.crossenv().arg("build").assert().success();

        assert_eq!(project.builds(), 2);
        let last_run = project
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("run"))
            .last()
            .unwrap();
        assert!(last_run.contains("test/armv7:v2 cargo build"));
    }

    #[test]
    fn failed_build_records_nothing() {
        let project = Project::new();

        project
            .crossenv()
            .env("FAKE_BUILD_FAIL", "1")
            .arg("build")
            .assert()
            .code(125)
            .stderr(predicate::str::contains("Error [provision]"));

        assert!(!project.path().join("Dockerfile.fingerprint").exists());
        assert!(!project.calls().iter().any(|c| c.starts_with("run")));

        // The next attempt retries the build
        project.crossenv().arg("build").assert().success();
        assert_eq!(project.builds(), 2);
    }

    #[test]
    fn missing_definition_fails_before_build() {
        let project = Project::new();

        project
            .crossenv()
            .args(["--definition", "does/not/exist", "build"])
            .assert()
            .code(125)
            .stderr(predicate::str::contains("Error [definition]"));

        assert_eq!(project.builds(), 0);
    }

    #[test]
    fn clean_forgets_fingerprint() {
        let project = Project::new();

        project.crossenv().arg("build").assert().success();
        project.crossenv().args(["env", "clean"]).assert().success();

        assert!(!project.path().join("Dockerfile.fingerprint").exists());
        assert!(!project.path().join("crossenv-run.sh").exists());

        project.crossenv().arg("build").assert().success();
        assert_eq!(project.builds(), 2);
    }

    #[test]
    fn status_reports_freshness() {
        let project = Project::new();

        project
            .crossenv()
            .args(["env", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Not provisioned"));

        project.crossenv().arg("build").assert().success();

        project
            .crossenv()
            .args(["env", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Up to date"));
    }
}
