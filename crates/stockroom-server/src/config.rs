use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use stockroom_db::DbConfig;
use stockroom_store::StoreConfig;

#[derive(Debug, Parser)]
#[command(name = "stockroom-server", about = "Stockroom inventory server")]
pub struct ServerConfig {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Address to listen on
    #[arg(long, env = "STOCKROOM_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on
    #[arg(long, env = "STOCKROOM_PORT", default_value = "3720")]
    pub port: u16,

    /// SQLite database file
    #[arg(long, env = "STOCKROOM_DB_PATH")]
    pub db_path: Option<String>,

    /// Directory for uploaded images
    #[arg(long, env = "STOCKROOM_UPLOAD_DIR")]
    pub upload_dir: Option<String>,

    /// Lifetime of a login session (hours)
    #[arg(long, env = "STOCKROOM_SESSION_TTL_HOURS", default_value = "12")]
    pub session_ttl_hours: i64,

    /// Largest accepted request body, uploads included (megabytes)
    #[arg(long, env = "STOCKROOM_MAX_UPLOAD_MB", default_value = "20")]
    pub max_upload_mb: usize,

    /// Serve every route without authentication
    #[arg(long)]
    pub no_auth: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a user, e.g. the first administrator
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        lastname: String,
        #[arg(long)]
        dni: String,
        /// Role id (1 = admin, 2 = operator)
        #[arg(long, default_value = "1")]
        role_id: i64,
        /// Password; read from the environment so it stays out of shell history
        #[arg(long, env = "STOCKROOM_NEW_PASSWORD")]
        password: String,
    },
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr> {
        let ip = self
            .bind
            .parse::<std::net::IpAddr>()
            .with_context(|| format!("invalid bind address '{}'", self.bind))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            sqlite_path: self.db_path.clone().filter(|p| !p.is_empty()),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            upload_dir: self.upload_dir.clone().filter(|d| !d.is_empty()),
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours.max(1))
    }

    pub fn body_limit(&self) -> usize {
        self.max_upload_mb.max(1) * 1024 * 1024
    }
}
