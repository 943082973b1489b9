//! Interactive chat.

use indicatif::{ProgressBar, ProgressStyle};
use miette::IntoDiagnostic;
use pocketchat_local_ai::{EngineConfig, ModelLifecycleManager, ReadinessState};
use pocketchat_session::{ChatSession, Sender, SubmitOutcome};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::AppConfig;

const QUIT_COMMAND: &str = "/quit";

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Load the model, then read prompts from stdin until EOF or `/quit`.
pub(crate) async fn run(config: &AppConfig, json: bool) -> miette::Result<()> {
    let descriptor = config.descriptor();
    let needs_download = config.needs_download();

    if needs_download {
        println!(
            "Downloading model: {} ({})",
            descriptor.name, descriptor.size_label
        );
        println!("This may take a while depending on your connection...");
    }

    let lifecycle = ModelLifecycleManager::launch(
        descriptor,
        config.acquirer(needs_download),
        Arc::new(config.engine_factory()),
        EngineConfig::default(),
    );

    // The download draws its own progress bar.
    let loading = (!needs_download).then(|| spinner("Loading AI Model..."));
    let state = lifecycle.wait_settled().await;
    if let Some(pb) = loading {
        pb.finish_and_clear();
    }

    if state != ReadinessState::Ready {
        let reason = lifecycle
            .failure()
            .map(|r| r.message)
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(miette::miette!(
            help = format!(
                "llama-server is expected at {}",
                config.llama_server_path().display()
            ),
            "Failed to initialize model: {}",
            reason
        ));
    }

    let session = ChatSession::new(lifecycle);
    println!(
        "AI Chat - {} ({}). Type {} to exit.",
        session.descriptor().name,
        session.descriptor().size_label,
        QUIT_COMMAND
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou: ");
        std::io::stdout().flush().into_diagnostic()?;

        let Some(line) = lines.next_line().await.into_diagnostic()? else {
            break;
        };
        if line.trim() == QUIT_COMMAND {
            break;
        }

        session.set_input(line);
        let thinking = spinner("Thinking...");
        let outcome = session.submit_input().await;
        thinking.finish_and_clear();

        match outcome {
            SubmitOutcome::Replied | SubmitOutcome::Recovered(_) => {
                if let Some(reply) = session
                    .transcript()
                    .last()
                    .filter(|m| m.sender == Sender::Agent)
                {
                    println!("AI: {}", reply.text);
                }
            }
            SubmitOutcome::Ignored(reason) => {
                tracing::debug!("Prompt not sent: {:?}", reason);
            }
        }
    }

    if json {
        let view = serde_json::to_string_pretty(&session.view()).into_diagnostic()?;
        println!("{}", view);
    }

    Ok(())
}
