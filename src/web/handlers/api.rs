//! Admin API handlers. Responses use the Layui table envelope
//! (`code` 0 = ok, 1 = error) the frontend expects.

use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::web::state::AppState;
use crate::web::store::{CreateTaskRequest, TaskEntry};

#[derive(Serialize)]
struct TableResponse {
    code: i32,
    msg: String,
    count: usize,
    data: Vec<TaskEntry>,
}

/// GET / - the embedded admin page.
pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(include_str!("../../../static/index.html"))
}

/// GET /api/tasks - all task rows, newest first.
pub async fn list_tasks(state: web::Data<AppState>) -> HttpResponse {
    match state.store.list_tasks().await {
        Ok(entries) => HttpResponse::Ok().json(TableResponse {
            code: 0,
            msg: String::new(),
            count: entries.len(),
            data: entries,
        }),
        Err(err) => internal_error(err),
    }
}

/// POST /api/tasks - insert a new task row (idle, enabled).
pub async fn create_task(
    state: web::Data<AppState>,
    payload: web::Json<CreateTaskRequest>,
) -> HttpResponse {
    if let Err(msg) = payload.validate() {
        return HttpResponse::BadRequest().json(json!({ "code": 1, "msg": msg }));
    }
    match state.store.create_task(&payload).await {
        Ok(entry) => HttpResponse::Created().json(json!({
            "code": 0,
            "msg": "task created",
            "data": entry,
        })),
        Err(err) => internal_error(err),
    }
}

fn internal_error(err: anyhow::Error) -> HttpResponse {
    error!(error = %err, "admin request failed");
    HttpResponse::InternalServerError().json(json!({ "code": 1, "msg": "internal error" }))
}
