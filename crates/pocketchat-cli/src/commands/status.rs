//! Status command - the settings screen.

use miette::IntoDiagnostic;
use pocketchat_local_ai::{EngineConfig, LlamaCppClient, ModelDescriptor};
use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;

use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct StatusReport {
    status: &'static str,
    model: ModelDescriptor,
    installed: bool,
    offline_mode: bool,
    threads: usize,
    context_size: u32,
    llama_server: PathBuf,
    llama_server_found: bool,
    port: u16,
}

/// Label for the model state as seen from outside a chat process.
///
/// An installed model with no engine answering is still to be loaded.
fn status_label(server_up: bool, installed: bool) -> &'static str {
    if server_up {
        "Ready"
    } else if installed {
        "Loading"
    } else {
        "Not downloaded"
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// The settings screen as plain text.
fn render(report: &StatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "PocketChat Settings");
    let _ = writeln!(out, "===================");
    let _ = writeln!(out);
    let _ = writeln!(out, "Model Information");
    let _ = writeln!(out, "  Status:    {}", report.status);
    let _ = writeln!(out, "  Model:     {}", report.model.name);
    let _ = writeln!(out, "  Size:      {}", report.model.size_label);
    let _ = writeln!(out, "  Source:    {}", report.model.source_url);
    let _ = writeln!(out, "  Path:      {}", report.model.local_path.display());
    let _ = writeln!(out, "  Installed: {}", yes_no(report.installed));
    let _ = writeln!(out);
    let _ = writeln!(out, "Performance");
    let _ = writeln!(out, "  Offline mode: on (all requests processed locally)");
    let _ = writeln!(out, "  Threads:      {}", report.threads);
    let _ = writeln!(out, "  Context:      {} tokens", report.context_size);
    let _ = writeln!(out);
    let _ = writeln!(out, "Engine");
    let _ = writeln!(out, "  llama-server: {}", report.llama_server.display());
    let _ = writeln!(out, "    Exists: {}", report.llama_server_found);
    let _ = writeln!(out, "  Port:         {}", report.port);
    out
}

pub(crate) async fn run(config: &AppConfig, json: bool) -> miette::Result<()> {
    let model = config.descriptor();
    let installed = model.is_installed();
    let server_up = LlamaCppClient::with_port(config.port)
        .check_health()
        .await
        .unwrap_or(false);
    let engine = EngineConfig::default();
    let llama_server = config.llama_server_path();

    let report = StatusReport {
        status: status_label(server_up, installed),
        installed,
        offline_mode: true,
        threads: engine.threads,
        context_size: engine.context_size,
        llama_server_found: llama_server.exists(),
        llama_server,
        port: config.port,
        model,
    };

    if json {
        let output = serde_json::to_string_pretty(&report).into_diagnostic()?;
        println!("{}", output);
        return Ok(());
    }

    print!("{}", render(&report));

    Ok(())
}
