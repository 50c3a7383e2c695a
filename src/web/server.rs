use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use tracing::info;

use crate::web::handlers::api;
use crate::web::state::AppState;

/// Start the admin web server; blocks until the server exits.
pub async fn start_web_server(addr: &str, state: AppState) -> Result<()> {
    info!("admin server listening on {}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .route("/", web::get().to(api::index))
            .route("/api/tasks", web::get().to(api::list_tasks))
            .route("/api/tasks", web::post().to(api::create_task))
    })
    .bind(addr)
    .with_context(|| format!("binding admin server to {addr}"))?
    .run()
    .await
    .context("admin server error")?;

    Ok(())
}
