#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![deny(warnings)]
#![allow(clippy::multiple_crate_versions)]

use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use anyhow::Context as _;
use sealed_session::{
    settings::{SessionRuntime, Settings},
    RequestSession, SessionError, SessionMiddleware,
};
use serde_json::json;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Loads .env and Settings.toml, applies env overrides and initializes the logger
    let settings = Settings::load()?;

    let SessionRuntime {
        manager,
        memory_store,
    } = settings
        .build_manager()
        .context("Invalid [session] configuration, set SESSION_SECRET or SESSION_KEYS")?;

    let sweeper = memory_store.map(|store| {
        store.spawn_sweeper(settings.sweep_interval(), settings.store.sweep_batch)
    });

    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    HttpServer::new(move || {
        App::new()
            .wrap(SessionMiddleware::new(manager.clone()))
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    Ok(())
}

fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(visit))
        .route("/logout", web::post().to(logout))
        .route("/health", web::get().to(health));
}

/// Count visits in the session
async fn visit(session: RequestSession) -> Result<HttpResponse, SessionError> {
    let visits = session.get::<u64>("visits").unwrap_or(0) + 1;
    session.insert("visits", visits)?;
    Ok(HttpResponse::Ok().json(json!({ "visits": visits })))
}

async fn logout(session: RequestSession) -> Result<HttpResponse, SessionError> {
    session.destroy().await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok", "version": sealed_session::VERSION }))
}

fn print_startup_info(bind_address: &str, settings: &Settings) {
    let backend = match settings.store.backend {
        sealed_session::settings::StoreBackend::None => "Stateless (encrypted cookie)",
        sealed_session::settings::StoreBackend::Memory => "In-memory store",
    };
    log::info!("Starting sealed-session demo on http://{bind_address}");
    log::info!("Session backend: {backend}");
    log::info!("Session cookie: {}", settings.session.cookie_name);
    log::info!("Endpoints:");
    log::info!("  GET  /        - Visit counter");
    log::info!("  POST /logout  - Destroy the session");
    log::info!("  GET  /health  - Health check");
}
