//! Invocation of the ClustSafe administration tool.
//!
//! The tool is run once per scrape as
//! `<path> --host <target> --user <user> --password <password> -a -x <command>`
//! and its standard output is the XML report.

use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::trace;

use crate::config::{ClustsafeConfig, Credentials};
use crate::error::ExecError;

/// Source of raw report payloads for a target.
pub trait Fetcher: Send + Sync + 'static {
    /// Fetch the raw report for `target`. Either the whole payload or an error.
    fn fetch(&self, target: &str) -> impl Future<Output = Result<Vec<u8>, ExecError>> + Send;
}

/// Runs the administration tool as an external process.
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    config: Arc<ClustsafeConfig>,
    credentials: Arc<Credentials>,
}

impl CommandFetcher {
    /// Create a fetcher from process-wide settings.
    pub fn new(config: ClustsafeConfig, credentials: Credentials) -> Self {
        Self {
            config: Arc::new(config),
            credentials: Arc::new(credentials),
        }
    }

    /// Tool arguments for one invocation against `target`.
    pub fn args(&self, target: &str) -> Vec<String> {
        vec![
            "--host".to_string(),
            target.to_string(),
            "--user".to_string(),
            self.credentials.user.clone(),
            "--password".to_string(),
            self.credentials.password.clone(),
            // accept all SSL certificates
            "-a".to_string(),
            // XML output
            "-x".to_string(),
            self.config.command.as_str().to_string(),
        ]
    }
}

impl Fetcher for CommandFetcher {
    async fn fetch(&self, target: &str) -> Result<Vec<u8>, ExecError> {
        let timeout_secs = self.config.timeout_secs;

        trace!(
            tool = %self.config.path,
            host = target,
            command = %self.config.command,
            "Running ClustSafe command"
        );

        let child = Command::new(&self.config.path)
            .args(self.args(target))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| ExecError::Timeout { secs: timeout_secs })??;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(ExecError::Status {
                code: output.status.code(),
                stderr,
            });
        }

        if self.config.fail_on_stderr && !stderr.is_empty() {
            return Err(ExecError::Stderr(stderr));
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Subcommand;

    fn fetcher(path: &str, command: Subcommand) -> CommandFetcher {
        let config = ClustsafeConfig {
            path: path.to_string(),
            command,
            ..ClustsafeConfig::default()
        };
        CommandFetcher::new(config, Credentials::new("admin", "secret"))
    }

    /// Write an executable shell script standing in for the tool.
    #[cfg(unix)]
    fn script(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("cw-clustsafe");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    /// Fetch, retrying while a freshly written script is still busy (ETXTBSY).
    #[cfg(unix)]
    async fn fetch_script(fetcher: &CommandFetcher) -> Result<Vec<u8>, ExecError> {
        for _ in 0..20 {
            match fetcher.fetch("pdu1").await {
                Err(ExecError::Spawn(e)) if e.raw_os_error() == Some(26) => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                result => return result,
            }
        }
        fetcher.fetch("pdu1").await
    }

    #[test]
    fn test_argument_order() {
        let fetcher = fetcher("cw-clustsafe", Subcommand::Sensors);

        assert_eq!(
            fetcher.args("10.0.0.1"),
            vec![
                "--host",
                "10.0.0.1",
                "--user",
                "admin",
                "--password",
                "secret",
                "-a",
                "-x",
                "sensors"
            ]
        );
    }

    #[test]
    fn test_subcommand_is_last_argument() {
        for command in [Subcommand::Clustsafes, Subcommand::Sensors, Subcommand::All] {
            let args = fetcher("cw-clustsafe", command).args("pdu1");
            assert_eq!(args.last().map(String::as_str), Some(command.as_str()));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_returns_stdout() {
        // `echo` prints the assembled arguments back as the payload.
        let fetcher = fetcher("echo", Subcommand::All);
        let payload = fetcher.fetch("pdu1").await.unwrap();

        assert_eq!(
            String::from_utf8(payload).unwrap().trim(),
            "--host pdu1 --user admin --password secret -a -x all"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_non_zero_exit() {
        let fetcher = fetcher("false", Subcommand::All);
        let result = fetcher.fetch("pdu1").await;

        assert!(matches!(result, Err(ExecError::Status { .. })));
    }

    #[tokio::test]
    async fn test_fetch_missing_tool() {
        let fetcher = fetcher("/nonexistent/cw-clustsafe", Subcommand::All);
        let result = fetcher.fetch("pdu1").await;

        assert!(matches!(result, Err(ExecError::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClustsafeConfig {
            path: script(dir.path(), "exec sleep 5"),
            timeout_secs: 1,
            ..ClustsafeConfig::default()
        };
        let fetcher = CommandFetcher::new(config, Credentials::new("admin", "secret"));

        let started = std::time::Instant::now();
        let result = fetch_script(&fetcher).await;

        assert!(matches!(result, Err(ExecError::Timeout { secs: 1 })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_stderr_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(
            &script(dir.path(), "echo '<r/>'; echo warn >&2"),
            Subcommand::All,
        );

        let result = fetch_script(&fetcher).await;

        match result {
            Err(ExecError::Stderr(stderr)) => assert_eq!(stderr, "warn"),
            other => panic!("expected stderr failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_stderr_tolerated_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClustsafeConfig {
            path: script(dir.path(), "echo '<r/>'; echo warn >&2"),
            fail_on_stderr: false,
            ..ClustsafeConfig::default()
        };
        let fetcher = CommandFetcher::new(config, Credentials::new("admin", "secret"));

        let payload = fetch_script(&fetcher).await.unwrap();

        assert_eq!(String::from_utf8(payload).unwrap().trim(), "<r/>");
    }
}
