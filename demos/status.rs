//! Print the full status of a bootstrapped environment.
//!
//! Demonstrates:
//! - Looking up cached credentials by environment name
//! - Login negotiation and the advertised facade table
//! - Calling `Client.FullStatus` at the newest supported version
//!
//! Usage:
//!   cargo run --example status -- local
//!   cargo run --example status -- local --debug

// ============================================================================
// Imports
// ============================================================================

use anyhow::Context;
use jujulib::open_environment;
use serde_json::json;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let environment = args.next().unwrap_or_else(|| "local".to_owned());
    let debug = args.any(|a| a == "--debug");

    init_logging(debug);

    if let Err(e) = run(&environment).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let filter = if debug { "jujulib=trace" } else { "jujulib=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

async fn run(environment: &str) -> anyhow::Result<()> {
    println!("=== Status: {environment} ===\n");

    let conn = open_environment(environment)
        .await
        .with_context(|| format!("opening environment {environment}"))?;

    println!("[1] Logged in with Admin.Login v{}", conn.login_version());
    for name in conn.facades().names() {
        if let Some(versions) = conn.facades().versions(name) {
            println!("    {name}: {versions:?}");
        }
    }

    println!("\n[2] Client.FullStatus");
    let status = conn
        .facade("Client", None)?
        .invoke("FullStatus", json!({}))
        .await?;
    println!("{status:#}");

    conn.close().await?;
    Ok(())
}
