//! Table export through the external `mysqldump` binary

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::connection::ConnectionParams;
use crate::error::{ExportError, Result};

use super::channel::TableStats;

/// Invocation of `mysqldump` for single tables
#[derive(Debug, Clone)]
pub struct MysqldumpCommand {
    binary: PathBuf,
    params: ConnectionParams,
}

impl MysqldumpCommand {
    /// Locate `mysqldump` on `PATH`
    pub fn locate(params: ConnectionParams) -> Result<Self> {
        let binary = find_in_path("mysqldump").ok_or(ExportError::MysqldumpNotFound)?;
        debug!("Using {}", binary.display());
        Ok(Self::with_binary(binary, params))
    }

    /// Use an explicit binary
    pub fn with_binary(binary: impl Into<PathBuf>, params: ConnectionParams) -> Self {
        Self {
            binary: binary.into(),
            params,
        }
    }

    /// Command-line arguments for one table
    ///
    /// The password is passed through `MYSQL_PWD`, never on the command line.
    pub fn args(&self, table: &str) -> Vec<String> {
        let mut args = Vec::new();
        match &self.params.socket {
            Some(socket) => args.push(format!("--socket={}", socket.display())),
            None => {
                args.push(format!("--host={}", self.params.host));
                args.push(format!("--port={}", self.params.port));
            }
        }
        if !self.params.username.is_empty() {
            args.push(format!("--user={}", self.params.username));
        }
        args.push(self.params.database.clone());
        args.push(table.to_string());
        args
    }

    /// Dump one table into `target`
    ///
    /// Standard output goes to the artifact, standard error to the log.
    pub async fn dump_table(&self, table: &str, target: &Path) -> Result<TableStats> {
        let outfile = tokio::fs::File::create(target).await?.into_std().await;

        let mut command = Command::new(&self.binary);
        command
            .args(self.args(table))
            .stdin(Stdio::null())
            .stdout(Stdio::from(outfile))
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(password) = &self.params.password {
            command.env("MYSQL_PWD", password);
        }

        let mut child = command.spawn()?;
        let stderr = child.stderr.take();

        let forward = async {
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("mysqldump [{}]: {}", table, line);
                }
            }
        };
        let (status, ()) = tokio::join!(child.wait(), forward);
        let status = status?;

        if !status.success() {
            return Err(ExportError::MysqldumpFailed {
                table: table.to_string(),
                status: status.to_string(),
            }
            .into());
        }

        let bytes = tokio::fs::metadata(target).await?.len();
        Ok(TableStats { rows: 0, bytes })
    }
}

/// Search `PATH` for an executable file
fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;

    fn params() -> ConnectionParams {
        let mut config = ConnectionConfig::default();
        config.database = Some("shop".to_string());
        config.password = Some("secret".to_string());
        ConnectionParams::from_config(&config).unwrap()
    }

    #[test]
    fn test_args_tcp() {
        let command = MysqldumpCommand::with_binary("/usr/bin/mysqldump", params());
        assert_eq!(
            command.args("users"),
            vec![
                "--host=127.0.0.1",
                "--port=3306",
                "--user=root",
                "shop",
                "users"
            ]
        );
    }

    #[test]
    fn test_args_socket_and_no_password() {
        let mut p = params();
        p.socket = Some(PathBuf::from("/tmp/mysql.sock"));
        let args = MysqldumpCommand::with_binary("mysqldump", p).args("logs");
        assert_eq!(args[0], "--socket=/tmp/mysql.sock");
        assert!(args.iter().all(|a| !a.contains("secret")));
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-mysqldump");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dump_table_redirects_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let binary = script(dir.path(), r#"echo "-- dump of $4.$5 pw=$MYSQL_PWD""#);
        let target = dir.path().join("users.sql");

        let stats = MysqldumpCommand::with_binary(binary, params())
            .dump_table("users", &target)
            .await
            .unwrap();

        let content = std::fs::read_to_string(&target).unwrap();
        assert_eq!(content, "-- dump of shop.users pw=secret\n");
        assert_eq!(stats.bytes, content.len() as u64);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dump_table_failure_status() {
        let dir = tempfile::tempdir().unwrap();
        let binary = script(dir.path(), "echo 'Access denied' >&2\nexit 2");
        let target = dir.path().join("users.sql");

        let err = MysqldumpCommand::with_binary(binary, params())
            .dump_table("users", &target)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("mysqldump failed for table 'users'"));
    }
}
