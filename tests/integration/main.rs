//! Integration tests for cache-relay

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const OFFLINE_CONFIG: &str = r#"
[subscription]
enabled = false

[hosted]
max_attempts = 1
request_timeout_secs = 5

[s3]
aws_cli = "/nonexistent/aws"
"#;

    /// A scratch job: workspace, runner files and a config file
    struct Job {
        dir: TempDir,
    }

    impl Job {
        fn new(config: &str) -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("config.toml"), config).unwrap();
            std::fs::create_dir_all(dir.path().join("workspace/target")).unwrap();
            std::fs::write(dir.path().join("workspace/target/out.txt"), "built").unwrap();
            Self { dir }
        }

        fn offline() -> Self {
            Self::new(OFFLINE_CONFIG)
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn read(&self, name: &str) -> String {
            std::fs::read_to_string(self.path(name)).unwrap_or_default()
        }

        /// The binary with a clean runner environment
        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("cache-relay");
            cmd.env_clear()
                .env("PATH", std::env::var_os("PATH").unwrap_or_default())
                .env("HOME", self.dir.path())
                .env("CACHE_RELAY_CONFIG", self.path("config.toml"))
                .env("GITHUB_WORKSPACE", self.path("workspace"))
                .env("RUNNER_TEMP", self.dir.path())
                .env("GITHUB_OUTPUT", self.path("output"))
                .env("GITHUB_STATE", self.path("state"))
                .current_dir(self.path("workspace"));
            cmd
        }

        /// The binary inside a push build with the cache service configured
        fn job_cmd(&self) -> Command {
            let mut cmd = self.cmd();
            cmd.env("GITHUB_EVENT_NAME", "push")
                .env("GITHUB_REF", "refs/heads/main")
                .env("GITHUB_REPOSITORY", "acme/widgets")
                .env("ACTIONS_CACHE_URL", "http://127.0.0.1:9/")
                .env("ACTIONS_RUNTIME_TOKEN", "token");
            cmd
        }
    }

    fn exists(path: &Path) -> bool {
        path.exists()
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("cache-relay")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("restore-only"))
            .stdout(predicate::str::contains("save-only"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("cache-relay")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("cache-relay"));
    }

    #[test]
    fn restore_without_cache_service_reports_no_hit() {
        let job = Job::offline();

        job.cmd()
            .env("GITHUB_REF", "refs/heads/main")
            .env("INPUT_KEY", "v1-abc")
            .env("INPUT_PATH", "target")
            .arg("restore")
            .assert()
            .success()
            .stdout(predicate::str::contains("::warning::An internal error has occurred"));

        let output = job.read("output");
        assert!(output.starts_with("cache-hit<<ghadelimiter_"));
        assert!(output.contains("\nfalse\n"));
    }

    #[test]
    fn restore_on_unsupported_event_is_skipped() {
        let job = Job::offline();

        job.cmd()
            .env("GITHUB_EVENT_NAME", "schedule")
            .env("ACTIONS_CACHE_URL", "http://127.0.0.1:9/")
            .env("INPUT_KEY", "v1-abc")
            .env("INPUT_PATH", "target")
            .arg("restore")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "::warning::Event Validation Error: The event type schedule is not supported",
            ));

        assert!(!exists(&job.path("state")));
    }

    #[test]
    fn restore_without_key_fails() {
        let job = Job::offline();

        job.job_cmd()
            .env("INPUT_PATH", "target")
            .arg("restore")
            .assert()
            .code(1)
            .stdout(predicate::str::contains(
                "::error::Input required and not supplied: key",
            ));
    }

    #[test]
    fn restore_without_key_fails_in_library_mode() {
        let job = Job::offline();

        job.job_cmd()
            .env("INPUT_PATH", "target")
            .args(["restore", "--no-early-exit"])
            .assert()
            .code(1);
    }

    #[test]
    fn restore_records_primary_key_before_backend_failure() {
        let job = Job::offline();

        job.job_cmd()
            .args(["restore", "--key", "v1-abc", "--path", "target"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("::error::"));

        let state = job.read("state");
        assert!(state.starts_with("CACHE_KEY<<ghadelimiter_"));
        assert!(state.contains("\nv1-abc\n"));
        assert!(!state.contains("CACHE_RESULT"));
    }

    #[test]
    fn save_without_key_warns() {
        let job = Job::offline();

        job.job_cmd()
            .env("INPUT_PATH", "target")
            .arg("save")
            .assert()
            .success()
            .stdout(predicate::str::contains("::warning::Key is not specified."));
    }

    #[test]
    fn save_skips_when_primary_key_was_restored() {
        let job = Job::offline();

        job.job_cmd()
            .env("STATE_CACHE_KEY", "v1-abc")
            .env("STATE_CACHE_RESULT", "v1-abc")
            .env("INPUT_PATH", "target")
            .arg("save")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Cache hit occurred on the primary key v1-abc, not saving cache.",
            ));
    }

    #[test]
    fn save_failure_does_not_fail_the_step() {
        let job = Job::offline();

        job.job_cmd()
            .args(["save-only", "--key", "v1-abc", "--path", "target"])
            .assert()
            .success()
            .stdout(predicate::str::contains("::warning::Cache save failed."));
    }

    #[test]
    fn s3_toggle_selects_bucket_backend_for_restore() {
        let job = Job::offline();

        job.job_cmd()
            .env("RUNS_ON_S3_BUCKET_CACHE", "ci-cache")
            .args(["restore", "--key", "v1-abc", "--path", "target"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(
                "The cache action detected a local S3 bucket cache. Using it.",
            ))
            .stdout(predicate::str::contains("/nonexistent/aws"));
    }

    #[test]
    fn s3_save_does_not_need_cache_service() {
        let job = Job::offline();

        job.cmd()
            .env("GITHUB_REF", "refs/heads/main")
            .env("GITHUB_REPOSITORY", "acme/widgets")
            .env("RUNS_ON_S3_BUCKET_CACHE", "ci-cache")
            .args(["save", "--key", "v1-abc", "--path", "target"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "The cache action detected a local S3 bucket cache. Using it.",
            ))
            .stdout(predicate::str::contains("::warning::Failed to save"));
    }

    #[test]
    fn unreachable_subscription_api_fails_open() {
        let job = Job::new(
            r#"
[subscription]
api_url = "http://127.0.0.1:9"
timeout_secs = 1
"#,
        );

        job.cmd()
            .env("GITHUB_REPOSITORY", "acme/widgets")
            .env("INPUT_KEY", "v1-abc")
            .env("INPUT_PATH", "target")
            .arg("restore-only")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Timeout or API not reachable. Continuing to next step.",
            ));
    }

    #[test]
    fn invalid_config_fails() {
        let job = Job::new("[hosted]\nmax_attempts = \"many\"\n");

        job.job_cmd()
            .args(["restore", "--key", "v1-abc", "--path", "target"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn invalid_config_does_not_fail_save() {
        let job = Job::new("[hosted\nmax_attempts = 1\n");

        job.cmd()
            .env("GITHUB_REF", "refs/heads/main")
            .env("ACTIONS_CACHE_URL", "http://127.0.0.1:9/")
            .env("STATE_CACHE_KEY", "v1-abc")
            .env("STATE_CACHE_RESULT", "v1-abc")
            .env("INPUT_PATH", "target")
            .arg("save")
            .assert()
            .success()
            .stdout(predicate::str::contains("::warning::Invalid configuration"))
            .stdout(predicate::str::contains(
                "Cache hit occurred on the primary key v1-abc, not saving cache.",
            ));
    }
}
