//! Terminal output for the subscriber binary
//!
//! Events and forward results go to stdout; status changes go to stderr.

use hr_common::WebhookEvent;

use crate::forwarder::ForwardResult;
use crate::session::{ConnectionStatus, SessionState};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Check if color output is enabled
pub fn use_color() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

fn paint(color: bool, code: &str, text: &str) -> String {
    if color {
        format!("{code}{text}{RESET}")
    } else {
        text.to_string()
    }
}

/// Print a line for a session status transition.
pub fn print_status(status: &ConnectionStatus) {
    eprintln!("{}", format_status(status, use_color()));
}

/// Print an accepted event, with headers and body when `verbose`.
pub fn print_event(event: &WebhookEvent, verbose: bool) {
    println!("{}", format_event(event, verbose, use_color()));
}

/// Print one line per forward result.
pub fn print_forward_results(results: &[ForwardResult]) {
    let color = use_color();
    for result in results {
        println!("{}", format_forward_result(result, color));
    }
}

pub fn format_status(status: &ConnectionStatus, color: bool) -> String {
    match status.state {
        SessionState::Connecting => paint(color, DIM, "… connecting to hub"),
        SessionState::Connected => paint(color, GREEN, "● connected to hub"),
        SessionState::Reconnecting => paint(
            color,
            YELLOW,
            &format!("↻ reconnecting (attempt {})", status.reconnect_attempts),
        ),
        SessionState::Disconnected => match &status.last_error {
            Some(err) => paint(color, YELLOW, &format!("○ disconnected: {err}")),
            None => paint(color, DIM, "○ disconnected"),
        },
        SessionState::Failed => paint(
            color,
            RED,
            &format!(
                "✗ {}",
                status.last_error.as_deref().unwrap_or("connection failed")
            ),
        ),
    }
}

pub fn format_event(event: &WebhookEvent, verbose: bool, color: bool) -> String {
    let mut out = format!(
        "{} {} {} {}",
        paint(color, DIM, &event.timestamp().format("%H:%M:%S").to_string()),
        paint(color, BOLD, event.method()),
        paint(color, CYAN, event.endpoint()),
        paint(color, DIM, &event.id().to_string()),
    );

    if verbose {
        out.push_str("\n  headers:");
        for (name, value) in event.headers() {
            out.push_str(&format!("\n    {name}: {value}"));
        }
        let body = serde_json::to_string_pretty(event.body())
            .unwrap_or_else(|_| event.body().to_string());
        out.push_str("\n  body:");
        for line in body.lines() {
            out.push_str(&format!("\n    {line}"));
        }
    }

    out
}

pub fn format_forward_result(result: &ForwardResult, color: bool) -> String {
    let outcome = match (result.status_code, &result.error) {
        (Some(code), _) if result.success => code.to_string(),
        (_, Some(err)) => err.clone(),
        (Some(code), None) => code.to_string(),
        (None, None) => "failed".to_string(),
    };

    let mark = if result.success {
        paint(color, GREEN, "✓")
    } else {
        paint(color, RED, "✗")
    };

    format!(
        "  {mark} {} {outcome} {}",
        result.endpoint,
        paint(color, DIM, &format!("({}ms)", result.duration_ms)),
    )
}
