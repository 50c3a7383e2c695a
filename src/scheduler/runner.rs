//! Task runners. The HTTP runner drains a remote dataset for a task's
//! command by paginating through the task API:
//!
//! - `GET {base}/timer/getdata/command/{cmd}/limit/{n}/last_id/{id}` returns
//!   a page of rows with descending ids below `last_id` (0 means "from the
//!   top").
//! - `GET {base}/timer/update/command/{cmd}/data/{json-row}` applies one row.
//!
//! The minimum id seen in a page becomes the next page's `last_id`, so the
//! cursor only shrinks and the drain terminates once the server returns an
//! empty page (or a page without usable ids).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::scheduler::task::Task;

/// Page size used when a task does not set `data_count_limit`.
const DEFAULT_PAGE_LIMIT: i64 = 50;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Execute one drain for the task. Errors abort the run; the dispatcher
    /// records the outcome in the task's status column.
    async fn run(&self, task: &Task, cancel: &CancellationToken) -> Result<()>;
}

pub struct HttpTaskRunner {
    base_url: String,
    client: reqwest::Client,
}

/// Wire shape of the getdata endpoint.
#[derive(Debug, Deserialize)]
struct GetDataResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Vec<Map<String, Value>>,
}

impl HttpTaskRunner {
    /// Trailing slashes on the base URL are stripped. The timeout applies
    /// per request; a whole drain is unbounded by design.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn fetch_page(
        &self,
        command: &str,
        limit: i64,
        last_id: i64,
    ) -> Result<Vec<Map<String, Value>>> {
        let endpoint = format!(
            "{}/timer/getdata/command/{}/limit/{}/last_id/{}",
            self.base_url,
            urlencoding::encode(command),
            limit,
            last_id
        );
        let resp = self
            .client
            .get(&endpoint)
            .send()
            .await
            .context("getdata request")?;
        let status = resp.status();
        let body = resp.text().await.context("reading getdata body")?;
        if status.as_u16() >= 400 {
            bail!("getdata request failed: {status}");
        }
        let parsed: GetDataResponse =
            serde_json::from_str(&body).context("decoding getdata response")?;
        if !parsed.status.eq_ignore_ascii_case("SUCCESS") {
            bail!("getdata failed: {}", parsed.message);
        }
        Ok(parsed.data)
    }

    async fn send_update(&self, command: &str, row: &Map<String, Value>) -> Result<()> {
        let payload = serde_json::to_string(row).context("encoding row")?;
        let endpoint = format!(
            "{}/timer/update/command/{}/data/{}",
            self.base_url,
            urlencoding::encode(command),
            urlencoding::encode(&payload)
        );
        let resp = self
            .client
            .get(&endpoint)
            .send()
            .await
            .context("update request")?;
        let status = resp.status();
        if status.as_u16() >= 400 {
            let body = resp.text().await.unwrap_or_default();
            bail!("update request failed: {status} {body}");
        }
        let result: Value = resp.json().await.context("decoding update response")?;
        let row_status = result
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !row_status.eq_ignore_ascii_case("SUCCESS") {
            bail!(
                "update failed: {}",
                result
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
            );
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRunner for HttpTaskRunner {
    async fn run(&self, task: &Task, cancel: &CancellationToken) -> Result<()> {
        if self.base_url.is_empty() {
            bail!("task api base url is empty");
        }
        let limit = if task.data_count_limit > 0 {
            task.data_count_limit
        } else {
            DEFAULT_PAGE_LIMIT
        };
        let pacing = Duration::from_micros(task.run_sleep_micro.max(0) as u64);
        let mut last_id: i64 = 0;

        loop {
            let rows = tokio::select! {
                _ = cancel.cancelled() => bail!("run cancelled"),
                page = self.fetch_page(&task.command, limit, last_id) => page?,
            };
            if rows.is_empty() {
                return Ok(());
            }
            debug!(
                command = %task.command,
                rows = rows.len(),
                last_id,
                "processing page"
            );

            // 0 doubles as the "no id seen yet" sentinel, as in the legacy
            // wire contract; a page whose minimum stays 0 ends the drain.
            let mut min_id: i64 = 0;
            for row in &rows {
                let update = tokio::select! {
                    _ = cancel.cancelled() => bail!("run cancelled"),
                    result = self.send_update(&task.command, row) => result,
                };
                if let Err(err) = update {
                    warn!(command = %task.command, error = %err, "row update failed, skipping");
                }
                if let Some(id) = extract_id(row) {
                    if min_id == 0 || id < min_id {
                        min_id = id;
                    }
                }
                if !pacing.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => bail!("run cancelled"),
                        _ = tokio::time::sleep(pacing) => {}
                    }
                }
            }

            if min_id == 0 {
                return Ok(());
            }
            last_id = min_id;
        }
    }
}

/// Pulls an integer id out of a row. Servers are sloppy about the type:
/// numbers (floats truncate) and integer strings are accepted, anything
/// else contributes no id.
fn extract_id(row: &Map<String, Value>) -> Option<i64> {
    match row.get("id")? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
