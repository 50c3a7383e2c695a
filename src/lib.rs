//! # taskwheel - database-driven cron scheduler
//!
//! taskwheel dispatches tasks at minute granularity and executes each one
//! as a paginated HTTP fan-out against a remote task API.
//!
//! ## How it works
//!
//! Task rows live in a SQLite `tasks` table (schema-compatible with the
//! legacy layout: `is_enable = 0` means enabled, `status` is -1/0/1 for
//! failed/idle/running). A cache reloads the enabled rows every few
//! seconds and compiles each row's cron expression into a bitset matcher.
//! Once per wall-clock minute the dispatcher snapshots the cache, picks
//! the matching tasks, claims each one through a single-flight lock plus a
//! persisted `status = 1` write, and spawns the HTTP runner. The runner
//! drains the remote dataset for the task's command page by page, chasing
//! a shrinking `last_id` cursor, and the final status lands back in the
//! row.
//!
//! ## Cron dialect
//!
//! Six fields: `year month day-of-month day-of-week hour minute`, with
//! `*`, values, `a-b` ranges, `a/step` progressions, and `|`-paired
//! hour/minute sub-expressions. See [`scheduler::cron`].
//!
//! ## Modules
//!
//! - [`scheduler`] - cron compiler, task cache, dispatcher, HTTP runner
//! - [`web`] - admin UI for listing and inserting task rows
//! - [`cli`] - command multiplexer (`scheduler`, `web`)
//! - [`config`] - environment-driven settings

pub mod cli;
pub mod config;
pub mod logging;
pub mod scheduler;
pub mod web;
