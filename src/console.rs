use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cdp::CdpEvent;

/// Events that feed the log, subscribed together so they stay in order.
pub const EVENTS: [&str; 2] = ["Runtime.consoleAPICalled", "Runtime.exceptionThrown"];

/// Console lines captured during a request, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct ConsoleLog {
    messages: Arc<Mutex<Vec<String>>>,
}

impl ConsoleLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: String) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Append every formatted event from `rx` to `log` until the stream ends.
pub fn spawn_collector(mut rx: mpsc::Receiver<CdpEvent>, log: ConsoleLog) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(line) = format_event(&event) {
                log.push(line);
            }
        }
    })
}

#[must_use]
pub fn format_event(event: &CdpEvent) -> Option<String> {
    match event.method.as_str() {
        "Runtime.consoleAPICalled" => format_console_call(&event.params),
        "Runtime.exceptionThrown" => format_exception(&event.params),
        _ => None,
    }
}

/// `[LEVEL] arg arg ...`, or `None` when no argument has printable text.
fn format_console_call(params: &Value) -> Option<String> {
    let level = params["type"].as_str().unwrap_or("log").to_uppercase();
    let parts: Vec<String> = params["args"]
        .as_array()
        .map(|args| args.iter().map(format_arg).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    if parts.is_empty() {
        return None;
    }
    Some(format!("[{level}] {}", parts.join(" ")))
}

fn format_arg(arg: &Value) -> String {
    match arg.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string().trim_matches('"').to_string(),
        None => arg["description"].as_str().unwrap_or_default().to_string(),
    }
}

fn format_exception(params: &Value) -> Option<String> {
    let details = params.get("exceptionDetails")?;
    let message = details["exception"]["description"]
        .as_str()
        .filter(|d| !d.is_empty())
        .or_else(|| details["text"].as_str())
        .unwrap_or_default();
    Some(format!("[ERROR] {message}"))
}
