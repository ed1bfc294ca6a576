//! Actix server startup + app wiring.
//!
//! Resolves configuration, prepares the upload store, and serves the
//! transfer endpoint with request logging and the OpenAPI document.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::{Next, from_fn};
use actix_web::{App, Error, HttpServer, web};
use anyhow::{Context, Result};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api;
use crate::config;
use crate::openapi;
use crate::state::AppState;
use crate::store::UploadStore;

/// Build server state and start the Actix HTTP server.
pub(crate) async fn run(args: crate::Args) -> Result<()> {
    let cfg = load_config(args.config.as_ref())?;
    let bind = resolve_bind(args.bind, &cfg)?;
    let upload_dir = resolve_upload_dir(args.upload_dir, &cfg)?;

    let store = UploadStore::new(&upload_dir, cfg.strict_file_names());
    store
        .ensure_root()
        .with_context(|| format!("create upload dir {:?}", store.root()))?;

    tracing::info!(
        bind = %bind,
        upload_dir = %store.root().display(),
        strict_file_names = cfg.strict_file_names(),
        serialize_writes = cfg.serialize_writes(),
        "starting transfer-server"
    );
    if !cfg.strict_file_names() {
        tracing::warn!("strict_file_names disabled; file names are used as raw path suffixes");
    }

    let state = web::Data::new(AppState::new(store, cfg.serialize_writes()));
    setup_shutdown();

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(from_fn(log_transfer))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", openapi::ApiDoc::openapi()),
            )
            .service(api::health::health)
            .default_service(web::to(api::transfer))
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}

/// Return true when the request path should be logged.
fn should_log_path(path: &str) -> bool {
    !(path == "/health" || path.starts_with("/swagger-ui") || path.starts_with("/api-doc"))
}

/// Log one event per transfer request once the response is ready.
async fn log_transfer(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    if !should_log_path(req.path()) {
        return next.call(req).await;
    }
    let method = req.method().clone();
    let path = req.path().to_string();
    let file_name = api::transfer::file_name_param(req.query_string());
    let peer = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("-")
        .to_string();
    let start = Instant::now();

    let res = next.call(req).await?;
    tracing::info!(
        method = %method,
        path = %path,
        file_name = file_name.as_deref().unwrap_or("-"),
        status = res.status().as_u16(),
        peer = %peer,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "transfer request"
    );
    Ok(res)
}

/// Load server config from disk, falling back to defaults.
fn load_config(path: Option<&PathBuf>) -> Result<config::ServerConfig> {
    if let Some(path) = path {
        return config::ServerConfig::load(path);
    }
    let auto_path = std::env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.join("config.toml")))
        .filter(|path| path.exists());
    match auto_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "using config next to executable");
            config::ServerConfig::load(&path)
        }
        None => Ok(config::ServerConfig::default()),
    }
}

/// Resolve the final bind address from args + config.
fn resolve_bind(bind: Option<SocketAddr>, cfg: &config::ServerConfig) -> Result<SocketAddr> {
    if let Some(addr) = bind {
        return Ok(addr);
    }
    match config::bind_from_config(cfg)? {
        Some(addr) => Ok(addr),
        None => config::DEFAULT_BIND
            .parse()
            .context("parse default bind"),
    }
}

/// Resolve the upload directory from args + config.
fn resolve_upload_dir(dir: Option<PathBuf>, cfg: &config::ServerConfig) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => config::upload_dir_from_config(cfg),
    }
}

/// Install Ctrl+C handler that stops the Actix system.
fn setup_shutdown() {
    let _ = ctrlc::set_handler(move || {
        tracing::info!("shutdown requested");
        if let Some(system) = actix_web::rt::System::try_current() {
            system.stop();
        } else {
            std::process::exit(0);
        }
    });
}
