//! Connection management for MySQL
//!
//! This module provides:
//! - Connection parameters fixed for the whole run
//! - The [`ConnectionProvider`] seam that hands out one private session per call
//! - A `mysql_async` provider that opens a fresh, unpooled connection each time
//!
//! Connections are never pooled or shared. Every table worker opens its own
//! and closes it when done, so a slow cleanup in one worker cannot starve the
//! server's connection slots for the others.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::catalog::{CatalogSession, MySqlSession};
use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, Result};

/// Connection parameters shared by every connection of a run
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Server host name or IP address
    pub host: String,

    /// Server TCP port
    pub port: u16,

    /// Unix socket path, preferred over TCP when set
    pub socket: Option<PathBuf>,

    /// Username for authentication
    pub username: String,

    /// Password for authentication
    pub password: Option<String>,

    /// Database which will be dumped
    pub database: String,

    /// Connection timeout
    pub connect_timeout: Duration,
}

impl ConnectionParams {
    /// Build parameters from the connection section of the config
    ///
    /// # Returns
    /// * `Result<Self>` - Parameters, or an error when no database is set
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        let database = match config.database.as_deref() {
            Some(db) if !db.is_empty() => db.to_string(),
            _ => {
                return Err(ConnectionError::InvalidParameters(
                    "no database selected".to_string(),
                )
                .into());
            }
        };

        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            socket: config.socket.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            database,
            connect_timeout: Duration::from_secs(config.connect_timeout),
        })
    }

    /// Human-readable target without credentials
    pub fn display_target(&self) -> String {
        match &self.socket {
            Some(socket) => format!(
                "{}@unix({})/{}",
                self.username,
                socket.display(),
                self.database
            ),
            None => format!(
                "{}@{}:{}/{}",
                self.username, self.host, self.port, self.database
            ),
        }
    }

    /// Convert to `mysql_async` options
    pub fn to_opts(&self) -> Opts {
        let mut builder = OptsBuilder::default()
            .ip_or_hostname(self.host.clone())
            .tcp_port(self.port)
            .user(Some(self.username.clone()))
            .pass(self.password.clone())
            .db_name(Some(self.database.clone()));

        if let Some(socket) = &self.socket {
            builder = builder
                .socket(Some(socket.to_string_lossy().into_owned()))
                .prefer_socket(true);
        }

        Opts::from(builder)
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("socket", &self.socket)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Source of private database sessions
///
/// Each call to [`ConnectionProvider::open`] returns a new session owned
/// exclusively by the caller, who must close it.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Open a new private session
    async fn open(&self) -> Result<Box<dyn CatalogSession>>;

    /// Name of the database every session targets
    fn database(&self) -> &str;
}

/// Health check result
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Response time in milliseconds
    pub response_time_ms: u64,

    /// Server version
    pub server_version: String,
}

/// Provider opening one unpooled `mysql_async` connection per request
pub struct MySqlConnectionProvider {
    params: ConnectionParams,
    opts: Opts,
}

impl MySqlConnectionProvider {
    /// Create a new provider
    ///
    /// # Arguments
    /// * `params` - Connection parameters fixed for the run
    pub fn new(params: ConnectionParams) -> Self {
        let opts = params.to_opts();
        Self { params, opts }
    }

    /// Open a raw connection, bounded by the configured timeout
    async fn connect(&self) -> Result<Conn> {
        let timeout = self.params.connect_timeout;
        match tokio::time::timeout(timeout, Conn::new(self.opts.clone())).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(ConnectionError::ConnectionFailed(format!(
                "{}: {}",
                self.params.display_target(),
                e
            ))
            .into()),
            Err(_) => Err(ConnectionError::ConnectionFailed(format!(
                "{}: timed out after {}s",
                self.params.display_target(),
                timeout.as_secs()
            ))
            .into()),
        }
    }

    /// Connect once, ping and report the server version
    ///
    /// Used before any dispatch so unreachable servers and bad credentials
    /// fail the run up front.
    pub async fn health_check(&self) -> Result<HealthStatus> {
        let start = Instant::now();
        let mut conn = self.connect().await?;

        conn.ping()
            .await
            .map_err(|e| ConnectionError::PingFailed(e.to_string()))?;
        let version: Option<String> = conn
            .query_first("SELECT VERSION()")
            .await
            .map_err(|e| ConnectionError::PingFailed(e.to_string()))?;
        conn.disconnect().await?;

        Ok(HealthStatus {
            response_time_ms: start.elapsed().as_millis() as u64,
            server_version: version.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl ConnectionProvider for MySqlConnectionProvider {
    async fn open(&self) -> Result<Box<dyn CatalogSession>> {
        let conn = self.connect().await?;
        debug!("Opened connection {}", conn.id());
        Ok(Box::new(MySqlSession::new(conn)))
    }

    fn database(&self) -> &str {
        &self.params.database
    }
}
