use anyhow::Result;

mod cli;
mod config;
mod logging;
mod scheduler;
mod web;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
