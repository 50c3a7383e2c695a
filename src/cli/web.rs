//! Web command - run the admin UI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::config::Settings;
use crate::logging;
use crate::web::{start_web_server, AppState, TaskStore};

pub async fn cmd_web(addr: String, db: Option<PathBuf>) -> Result<()> {
    logging::init_logging();
    let settings = Settings::from_env();
    let db_path = db.unwrap_or(settings.db_path);

    let store = Arc::new(TaskStore::open(&db_path)?);
    let state = AppState::new(store);
    start_web_server(&addr, state).await
}
