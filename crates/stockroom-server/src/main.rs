use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use stockroom_core::user::CreateUser;
use stockroom_db::{Database, SqliteDatabase};
use stockroom_server::auth::AuthConfig;
use stockroom_server::config::{Command, ServerConfig};
use stockroom_server::InnerAppState;
use stockroom_service::LocalService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();

    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open(&config.db_config())?);
    let files = stockroom_store::create_store(&config.store_config()).await?;
    let service = LocalService::new(db, files);

    match config.command {
        Some(Command::CreateUser {
            ref username,
            ref name,
            ref lastname,
            ref dni,
            role_id,
            ref password,
        }) => {
            let user = service
                .create_user(&CreateUser {
                    name: name.clone(),
                    lastname: lastname.clone(),
                    dni: dni.clone(),
                    username: username.clone(),
                    password: password.clone(),
                    role_id,
                    status_id: 1,
                })
                .await?;
            eprintln!("Created user {} (id: {}, role: {})", user.username, user.id, user.role_name);
        }
        None => {
            let addr = config.addr()?;
            let auth = AuthConfig {
                required: !config.no_auth,
                session_ttl: config.session_ttl(),
            };
            if auth.required {
                info!("authentication enabled");
            } else {
                info!("authentication disabled (--no-auth)");
            }

            let state = Arc::new(InnerAppState {
                service,
                auth,
                body_limit: config.body_limit(),
            });

            let listener = TcpListener::bind(addr).await?;
            info!("stockroom-server listening on http://{addr}");
            stockroom_server::serve(listener, state).await?;
        }
    }

    Ok(())
}
