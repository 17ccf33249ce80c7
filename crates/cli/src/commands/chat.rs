//! `nexus chat`: run one turn in-process.
//!
//! Answer tokens go to stdout as they arrive; tool activity and the turn
//! summary go to stderr.

use std::io::Write;

use futures::StreamExt;
use nexus_agent::{FinishReason, StreamEvent};
use nexus_config::AppConfig;
use nexus_core::message::{ThreadId, ToolOutput};

pub async fn run(
    config: AppConfig,
    thread: String,
    message: String,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !config.has_api_key() {
        return Err(format!(
            "No API key found. Set OPENAI_API_KEY or add api_key to {}",
            AppConfig::config_dir().join("config.toml").display()
        )
        .into());
    }

    let runtime = nexus_gateway::build_runtime(&config).await?;
    let mut events = runtime.submit_turn(ThreadId::new(thread), message).await?;

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();

    while let Some(event) = events.next().await {
        if let Some(failure) = render_event(&event.event, &mut out, &mut err)? {
            return Err(failure.into());
        }
    }

    Ok(())
}

/// Write one event. Returns the error message if the turn failed.
fn render_event(
    event: &StreamEvent,
    out: &mut impl Write,
    err: &mut impl Write,
) -> std::io::Result<Option<String>> {
    match event {
        StreamEvent::Token { text } => {
            write!(out, "{text}")?;
            out.flush()?;
        }
        StreamEvent::ToolCallIssued {
            tool_name,
            arguments,
            ..
        } => {
            writeln!(err, "  -> {tool_name}({arguments})")?;
        }
        StreamEvent::ToolResult {
            tool_name,
            output,
            served_from_cache,
            latency_ms,
            ..
        } => {
            let status = match output {
                ToolOutput::Ok { .. } => "ok".to_string(),
                ToolOutput::Error { error } => format!("failed: {error}"),
            };
            let source = if *served_from_cache { "cached" } else { "live" };
            writeln!(err, "  <- {tool_name} {status} ({source}, {latency_ms}ms)")?;
        }
        StreamEvent::Done {
            steps,
            tool_calls,
            finish_reason,
            ..
        } => {
            writeln!(out)?;
            if *finish_reason == FinishReason::StepBudgetExhausted {
                writeln!(err, "  (step budget exhausted)")?;
            }
            writeln!(err, "  [{steps} steps, {tool_calls} tool calls]")?;
        }
        StreamEvent::Error { code, message } => {
            writeln!(out)?;
            return Ok(Some(format!("Turn failed ({code:?}): {message}")));
        }
    }
    Ok(None)
}
