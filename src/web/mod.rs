//! Admin web UI: a small Layui page for viewing and creating task rows.

pub mod handlers;
pub mod server;
pub mod state;
pub mod store;

pub use server::start_web_server;
pub use state::AppState;
pub use store::{CreateTaskRequest, TaskEntry, TaskStore};
