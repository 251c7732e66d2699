//! Integration tests for the CDP client and the page driver.
//!
//! Each test spins up a mock DevTools WebSocket server with scripted
//! replies, connects through the real transport, and checks both what the
//! caller sees and what went over the wire.

#![allow(clippy::needless_pass_by_value)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use surf::cdp::{CdpClient, CdpConfig, CdpError};
use surf::cli::{FormInput, RequestConfig};
use surf::console::{ConsoleLog, spawn_collector};
use surf::driver::{BrowserOptions, Driver};
use surf::error::ExitCode;
use surf::fetch;
use surf::framework::{self, PageKind};
use surf::paths::ToolDir;
use surf::session::{self, SessionRecord};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

// =============================================================================
// Mock server helpers
// =============================================================================

/// Maps one incoming command to the frames sent back, in order.
type Script = fn(&Value) -> Vec<Value>;

/// Start a mock server that answers with `script` and reports every
/// command it receives.
async fn start_scripted_server(
    script: Script,
) -> (SocketAddr, mpsc::UnboundedReceiver<Value>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let seen_tx = seen_tx.clone();
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(msg)) = source.next().await {
                    if let Message::Text(text) = msg {
                        let cmd: Value = serde_json::from_str(&text).unwrap();
                        let _ = seen_tx.send(cmd.clone());
                        for frame in script(&cmd) {
                            if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });
    (addr, seen_rx, handle)
}

/// Start a mock server that never responds to commands.
async fn start_silent_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (_sink, mut source) = ws.split();
                while source.next().await.is_some() {}
            });
        }
    });
    (addr, handle)
}

/// Start a mock server that answers one command, then hangs up.
async fn start_drop_after_one_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                if let Some(Ok(Message::Text(text))) = source.next().await {
                    let cmd: Value = serde_json::from_str(&text).unwrap();
                    let response = json!({"id": cmd["id"], "result": {}});
                    sink.send(Message::Text(response.to_string().into()))
                        .await
                        .unwrap();
                }
                drop(sink);
                drop(source);
            });
        }
    });
    (addr, handle)
}

fn reply(cmd: &Value, result: Value) -> Value {
    json!({"id": cmd["id"], "sessionId": cmd["sessionId"], "result": result})
}

fn error_reply(cmd: &Value, code: i64, message: &str) -> Value {
    json!({"id": cmd["id"], "error": {"code": code, "message": message}})
}

fn event(method: &str, session_id: &str, params: Value) -> Value {
    json!({"method": method, "sessionId": session_id, "params": params})
}

fn console_call(session_id: &str, kind: &str, text: &str) -> Value {
    event(
        "Runtime.consoleAPICalled",
        session_id,
        json!({"type": kind, "args": [{"type": "string", "value": text}]}),
    )
}

/// How the page behind the mock tab behaves.
#[derive(Clone, Copy)]
struct Site {
    liveview: bool,
    submit_buttons: u64,
    /// Answer for the body readiness probe.
    ready: bool,
    reject_init_script: bool,
}

const PLAIN: Site = Site {
    liveview: false,
    submit_buttons: 1,
    ready: true,
    reject_init_script: false,
};

fn evaluate_result(expr: &str, site: Site) -> Value {
    if expr.contains("throw") {
        return json!({
            "result": {"type": "object"},
            "exceptionDetails": {
                "text": "Uncaught",
                "exception": {"description": "Error: nope"}
            }
        });
    }
    let value = if expr.contains("data-phx-session") {
        json!(site.liveview)
    } else if expr.contains("location.href") {
        json!("http://x.test/")
    } else if expr.contains("document.readyState") {
        json!(site.ready)
    } else if expr.contains("getClientRects") {
        json!(!expr.contains("#never"))
    } else if expr.contains("querySelectorAll") {
        json!(site.submit_buttons)
    } else {
        json!("hello")
    };
    json!({"result": {"value": value}})
}

/// A browser with one tab, `T1`, reachable through session `S1`, showing
/// `site`.
fn site_script(cmd: &Value, site: Site) -> Vec<Value> {
    let params = &cmd["params"];
    match cmd["method"].as_str().unwrap_or_default() {
        "Target.createTarget" => vec![reply(cmd, json!({"targetId": "T1"}))],
        "Target.attachToTarget" if params["targetId"] == "GONE" => {
            vec![error_reply(cmd, -32602, "No target with given id found")]
        }
        "Target.attachToTarget" => vec![reply(cmd, json!({"sessionId": "S1"}))],
        "Runtime.enable" => vec![
            reply(cmd, json!({})),
            console_call("S1", "log", "first"),
            event(
                "Runtime.exceptionThrown",
                "S1",
                json!({"exceptionDetails": {
                    "text": "Uncaught",
                    "exception": {"description": "Error: boom"}
                }}),
            ),
            console_call("OTHER", "log", "not ours"),
            console_call("S1", "warning", "third"),
        ],
        "Runtime.evaluate" => {
            let expr = params["expression"].as_str().unwrap_or_default();
            vec![reply(cmd, evaluate_result(expr, site))]
        }
        "Page.addScriptToEvaluateOnNewDocument" if site.reject_init_script => {
            vec![error_reply(cmd, -32000, "Not allowed")]
        }
        "Page.navigate" => {
            let url = params["url"].as_str().unwrap_or_default();
            if url.contains("unreachable") {
                vec![reply(
                    cmd,
                    json!({"frameId": "F", "errorText": "net::ERR_NAME_NOT_RESOLVED"}),
                )]
            } else if url.contains("stale") {
                // Only an older document finishes loading.
                vec![
                    reply(cmd, json!({"frameId": "F", "loaderId": "L2"})),
                    frame_navigated("OLD"),
                    event("Page.loadEventFired", "S1", json!({"timestamp": 1.0})),
                ]
            } else {
                vec![
                    reply(cmd, json!({"frameId": "F", "loaderId": "L"})),
                    event("Page.loadEventFired", "S1", json!({"timestamp": 0.5})),
                    frame_navigated("L"),
                    event("Page.loadEventFired", "S1", json!({"timestamp": 1.0})),
                ]
            }
        }
        "DOM.getDocument" => vec![reply(cmd, json!({"root": {"nodeId": 1}}))],
        "DOM.querySelector" if params["selector"] == "#missing" => {
            vec![reply(cmd, json!({"nodeId": 0}))]
        }
        "DOM.querySelector" => vec![reply(cmd, json!({"nodeId": 5}))],
        "DOM.resolveNode" => vec![reply(cmd, json!({"object": {"objectId": "O5"}}))],
        "DOM.getOuterHTML" => vec![reply(
            cmd,
            json!({"outerHTML": "<html><body><h1>Hi</h1></body></html>"}),
        )],
        "DOM.getBoxModel" => vec![reply(
            cmd,
            json!({"model": {"content": [10, 20, 110, 20, 110, 70, 10, 70]}}),
        )],
        "Page.getLayoutMetrics" => vec![reply(
            cmd,
            json!({"cssContentSize": {"x": 0, "y": 0, "width": 800.4, "height": 2000}}),
        )],
        // "PNGDATA"
        "Page.captureScreenshot" => vec![reply(cmd, json!({"data": "UE5HREFUQQ=="}))],
        _ => vec![reply(cmd, json!({}))],
    }
}

fn frame_navigated(loader_id: &str) -> Value {
    event(
        "Page.frameNavigated",
        "S1",
        json!({"frame": {"id": "F", "loaderId": loader_id, "url": "http://x.test/"}}),
    )
}

/// A LiveView page.
fn browser_script(cmd: &Value) -> Vec<Value> {
    site_script(cmd, Site { liveview: true, ..PLAIN })
}

fn plain_site(cmd: &Value) -> Vec<Value> {
    site_script(cmd, PLAIN)
}

fn buttonless_site(cmd: &Value) -> Vec<Value> {
    site_script(cmd, Site { submit_buttons: 0, ..PLAIN })
}

fn no_init_scripts_site(cmd: &Value) -> Vec<Value> {
    site_script(cmd, Site { reject_init_script: true, ..PLAIN })
}

/// The page behind `/after` never finishes parsing.
fn stalling_after_submit_site(cmd: &Value) -> Vec<Value> {
    static LEFT_FIRST_PAGE: AtomicBool = AtomicBool::new(false);
    if cmd["method"] == "Page.navigate"
        && cmd["params"]["url"].as_str().is_some_and(|u| u.ends_with("/after"))
    {
        LEFT_FIRST_PAGE.store(true, Ordering::SeqCst);
    }
    let ready = !LEFT_FIRST_PAGE.load(Ordering::SeqCst);
    site_script(cmd, Site { ready, ..PLAIN })
}

/// Sends far more console output than a small listener queue holds.
fn chatty_browser(cmd: &Value) -> Vec<Value> {
    if cmd["method"] == "Runtime.enable" {
        let mut frames = vec![reply(cmd, json!({}))];
        frames.extend((0..10).map(|i| console_call("S1", "log", &format!("line {i}"))));
        return frames;
    }
    plain_site(cmd)
}

fn quick_config() -> CdpConfig {
    CdpConfig {
        connect_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_secs(5),
        ..CdpConfig::default()
    }
}

fn record(addr: SocketAddr, target_id: &str) -> SessionRecord {
    SessionRecord {
        ws_url: format!("ws://{addr}"),
        profile: "default".into(),
        headful: false,
        pid: 0,
        target_id: target_id.into(),
    }
}

async fn attach(addr: SocketAddr, sessions_dir: &Path, target_id: &str) -> Driver {
    Driver::attach_session(sessions_dir, "work", record(addr, target_id), quick_config())
        .await
        .unwrap()
}

/// Every command the server has seen so far.
fn drain(seen: &mut mpsc::UnboundedReceiver<Value>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(cmd) = seen.try_recv() {
        out.push(cmd);
    }
    out
}

fn methods(cmds: &[Value]) -> Vec<&str> {
    cmds.iter().filter_map(|c| c["method"].as_str()).collect()
}

// =============================================================================
// Client
// =============================================================================

#[tokio::test]
async fn command_gets_its_result() {
    let (addr, _seen, _server) = start_scripted_server(browser_script).await;
    let client = CdpClient::connect(&format!("ws://{addr}"), quick_config())
        .await
        .unwrap();

    let target = client.create_target("about:blank").await.unwrap();
    assert_eq!(target, "T1");
    client.close().await.unwrap();
}

#[tokio::test]
async fn protocol_error_is_surfaced() {
    let (addr, _seen, _server) = start_scripted_server(browser_script).await;
    let client = CdpClient::connect(&format!("ws://{addr}"), quick_config())
        .await
        .unwrap();

    let err = client.attach("GONE").await.unwrap_err();
    match err {
        CdpError::Protocol { code, message } => {
            assert_eq!(code, -32602);
            assert!(message.contains("No target"));
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn silent_browser_times_out() {
    let (addr, _server) = start_silent_server().await;
    let config = CdpConfig {
        command_timeout: Duration::from_millis(200),
        ..quick_config()
    };
    let client = CdpClient::connect(&format!("ws://{addr}"), config).await.unwrap();

    let err = client.send_command("Browser.getVersion", None).await.unwrap_err();
    assert!(
        matches!(&err, CdpError::CommandTimeout { method } if method == "Browser.getVersion"),
        "{err:?}"
    );
}

#[tokio::test]
async fn commands_after_hangup_report_closed() {
    let (addr, _server) = start_drop_after_one_server().await;
    let client = CdpClient::connect(&format!("ws://{addr}"), quick_config())
        .await
        .unwrap();

    client.send_command("Browser.getVersion", None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let err = client.send_command("Browser.getVersion", None).await.unwrap_err();
    assert!(matches!(err, CdpError::ConnectionClosed), "{err:?}");
}

#[tokio::test]
async fn refused_connection_is_a_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = CdpClient::connect(&format!("ws://{addr}"), quick_config())
        .await
        .unwrap_err();
    assert!(matches!(err, CdpError::Connection(_)), "{err:?}");
}

// =============================================================================
// Session attachment
// =============================================================================

#[tokio::test]
async fn new_session_creates_and_persists_tab() {
    let (addr, mut seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    session::save(dir.path(), "work", &record(addr, "")).unwrap();

    let driver = attach(addr, dir.path(), "").await;
    assert_eq!(driver.target_id(), "T1");

    let stored = session::load(dir.path(), "work").unwrap().unwrap();
    assert_eq!(stored.target_id, "T1");

    let cmds = drain(&mut seen);
    assert_eq!(
        methods(&cmds),
        vec!["Target.createTarget", "Target.attachToTarget"]
    );
    assert_eq!(cmds[1]["params"]["flatten"], true);
    driver.close().await;
}

#[tokio::test]
async fn known_tab_is_reused() {
    let (addr, mut seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    session::save(dir.path(), "work", &record(addr, "T9")).unwrap();

    let driver = attach(addr, dir.path(), "T9").await;
    assert_eq!(driver.target_id(), "T9");

    let cmds = drain(&mut seen);
    assert_eq!(methods(&cmds), vec!["Target.attachToTarget"]);
    assert_eq!(cmds[0]["params"]["targetId"], "T9");
    let stored = session::load(dir.path(), "work").unwrap().unwrap();
    assert_eq!(stored.target_id, "T9");
    driver.close().await;
}

#[tokio::test]
async fn vanished_tab_is_replaced() {
    let (addr, _seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();

    let driver = attach(addr, dir.path(), "GONE").await;
    assert_eq!(driver.target_id(), "T1");
    let stored = session::load(dir.path(), "work").unwrap().unwrap();
    assert_eq!(stored.target_id, "T1");
    driver.close().await;
}

#[tokio::test]
async fn unreachable_session_browser_is_a_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let dir = tempfile::tempdir().unwrap();

    let result = Driver::attach_session(dir.path(), "work", record(addr, "T1"), quick_config()).await;
    let Err(err) = result else {
        panic!("expected attach to fail");
    };
    assert_eq!(err.code, ExitCode::ConnectionError);
}

// =============================================================================
// Page operations
// =============================================================================

#[tokio::test]
async fn navigate_waits_for_load_event() {
    let (addr, mut seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    driver.navigate("http://x.test/").await.unwrap();

    let cmds = drain(&mut seen);
    let nav = cmds.iter().find(|c| c["method"] == "Page.navigate").unwrap();
    assert_eq!(nav["params"]["url"], "http://x.test/");
    assert_eq!(nav["sessionId"], "S1");
    assert!(methods(&cmds).contains(&"Page.enable"));
    driver.close().await;
}

#[tokio::test]
async fn navigate_reports_network_errors() {
    let (addr, _seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    let err = driver.navigate("http://unreachable.test/").await.unwrap_err();
    assert!(err.message.contains("ERR_NAME_NOT_RESOLVED"), "{}", err.message);
    driver.close().await;
}

#[tokio::test]
async fn evaluate_returns_value_and_surfaces_exceptions() {
    let (addr, mut seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    assert_eq!(driver.evaluate("1 + 1").await.unwrap(), json!("hello"));
    let cmds = drain(&mut seen);
    let eval = cmds.iter().find(|c| c["method"] == "Runtime.evaluate").unwrap();
    assert_eq!(eval["params"]["returnByValue"], true);
    assert_eq!(eval["params"]["awaitPromise"], true);

    let err = driver.evaluate("throw new Error('nope')").await.unwrap_err();
    assert!(err.message.contains("Error: nope"), "{}", err.message);
    driver.close().await;
}

#[tokio::test]
async fn liveview_marker_is_detected() {
    let (addr, _seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    assert_eq!(framework::detect(&mut driver).await, PageKind::LiveView);
    driver.close().await;
}

#[tokio::test]
async fn visibility_wait_times_out() {
    let (addr, _seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    let err = driver
        .wait_until_visible("#never", Duration::from_millis(300))
        .await
        .unwrap_err();
    assert_eq!(err.code, ExitCode::TimeoutError);
    driver.close().await;
}

#[tokio::test]
async fn outer_html_reads_document_element() {
    let (addr, mut seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    let html = driver.outer_html().await.unwrap();
    assert_eq!(html, "<html><body><h1>Hi</h1></body></html>");

    let cmds = drain(&mut seen);
    let query = cmds.iter().find(|c| c["method"] == "DOM.querySelector").unwrap();
    assert_eq!(query["params"]["selector"], "html");
    assert_eq!(query["params"]["nodeId"], 1);
    driver.close().await;
}

#[tokio::test]
async fn missing_element_is_a_target_error() {
    let (addr, _seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    let err = driver.click("#missing").await.unwrap_err();
    assert_eq!(err.code, ExitCode::TargetError);
    driver.close().await;
}

#[tokio::test]
async fn screenshot_covers_full_content() {
    let (addr, mut seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    let png = driver.screenshot().await.unwrap();
    assert_eq!(png, b"PNGDATA");

    let cmds = drain(&mut seen);
    let capture = cmds
        .iter()
        .find(|c| c["method"] == "Page.captureScreenshot")
        .unwrap();
    assert_eq!(capture["params"]["format"], "png");
    assert_eq!(capture["params"]["captureBeyondViewport"], true);
    assert_eq!(capture["params"]["clip"]["width"], 801.0);
    assert_eq!(capture["params"]["clip"]["height"], 2000.0);
    driver.close().await;
}

#[tokio::test]
async fn click_presses_at_box_center() {
    let (addr, mut seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    driver.click("#go").await.unwrap();

    let cmds = drain(&mut seen);
    assert!(methods(&cmds).contains(&"DOM.scrollIntoViewIfNeeded"));
    let mouse: Vec<&Value> = cmds
        .iter()
        .filter(|c| c["method"] == "Input.dispatchMouseEvent")
        .collect();
    assert_eq!(mouse.len(), 2);
    assert_eq!(mouse[0]["params"]["type"], "mousePressed");
    assert_eq!(mouse[1]["params"]["type"], "mouseReleased");
    assert_eq!(mouse[0]["params"]["x"], 60.0);
    assert_eq!(mouse[0]["params"]["y"], 45.0);
    assert_eq!(mouse[0]["params"]["button"], "left");
    driver.close().await;
}

#[tokio::test]
async fn send_keys_types_text_and_presses_enter() {
    let (addr, mut seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    driver.send_keys("#f", "ab\r").await.unwrap();

    let cmds = drain(&mut seen);
    let typed: Vec<&Value> = cmds
        .iter()
        .filter(|c| {
            c["method"] == "DOM.focus"
                || c["method"] == "Input.insertText"
                || c["method"] == "Input.dispatchKeyEvent"
        })
        .collect();
    assert_eq!(typed.len(), 4);
    assert_eq!(typed[0]["method"], "DOM.focus");
    assert_eq!(typed[1]["params"]["text"], "ab");
    assert_eq!(typed[2]["params"]["type"], "keyDown");
    assert_eq!(typed[2]["params"]["key"], "Enter");
    assert_eq!(typed[2]["params"]["text"], "\r");
    assert_eq!(typed[3]["params"]["type"], "keyUp");
    driver.close().await;
}

// =============================================================================
// Console capture
// =============================================================================

#[tokio::test]
async fn console_events_arrive_in_order_for_this_tab_only() {
    let (addr, _seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    let log = ConsoleLog::new();
    let rx = driver.console_events().await.unwrap();
    let collector = spawn_collector(rx, log.clone());

    // The events were written before this reply, so they are dispatched by
    // the time it arrives.
    driver.evaluate("1").await.unwrap();
    driver.close().await;
    tokio::time::timeout(Duration::from_secs(2), collector)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        log.snapshot(),
        vec!["[LOG] first", "[ERROR] Error: boom", "[WARNING] third"]
    );
}

#[tokio::test]
async fn full_listener_queue_drops_events_but_keeps_the_connection() {
    let (addr, _seen, _server) = start_scripted_server(chatty_browser).await;
    let dir = tempfile::tempdir().unwrap();
    let config = CdpConfig {
        channel_capacity: 2,
        ..quick_config()
    };
    let mut driver = Driver::attach_session(dir.path(), "work", record(addr, "T1"), config)
        .await
        .unwrap();

    let mut rx = driver.console_events().await.unwrap();
    assert_eq!(driver.evaluate("1").await.unwrap(), json!("hello"));
    driver.close().await;

    let mut received = Vec::new();
    while let Some(event) = rx.recv().await {
        received.push(event.params["args"][0]["value"].clone());
    }
    assert_eq!(received, vec![json!("line 0"), json!("line 1")]);
}

// =============================================================================
// Navigation
// =============================================================================

#[tokio::test]
async fn load_of_an_older_document_does_not_end_navigation() {
    let (addr, _seen, _server) = start_scripted_server(plain_site).await;
    let dir = tempfile::tempdir().unwrap();
    let config = CdpConfig {
        command_timeout: Duration::from_millis(300),
        ..quick_config()
    };
    let mut driver = Driver::attach_session(dir.path(), "work", record(addr, "T1"), config)
        .await
        .unwrap();

    let err = driver.navigate("http://stale.test/").await.unwrap_err();
    assert_eq!(err.code, ExitCode::TimeoutError);
    driver.close().await;
}

// =============================================================================
// Form submission and post-script waits
// =============================================================================

#[tokio::test]
async fn standard_form_clicks_its_submit_button() {
    let (addr, mut seen, _server) = start_scripted_server(plain_site).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    framework::submit_form(&mut driver, PageKind::Standard, "login")
        .await
        .unwrap();

    let cmds = drain(&mut seen);
    let count = cmds
        .iter()
        .find(|c| c["method"] == "Runtime.evaluate")
        .unwrap();
    assert!(
        count["params"]["expression"]
            .as_str()
            .unwrap()
            .contains("#login button[type='submit']")
    );
    let names = methods(&cmds);
    assert_eq!(
        names.iter().filter(|m| **m == "Input.dispatchMouseEvent").count(),
        2
    );
    assert!(!names.contains(&"Input.dispatchKeyEvent"));
    driver.close().await;
}

#[tokio::test]
async fn standard_form_without_button_presses_enter() {
    let (addr, mut seen, _server) = start_scripted_server(buttonless_site).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    framework::submit_form(&mut driver, PageKind::Standard, "login")
        .await
        .unwrap();

    let cmds = drain(&mut seen);
    let names = methods(&cmds);
    assert!(!names.contains(&"Input.dispatchMouseEvent"));
    let keys: Vec<&Value> = cmds
        .iter()
        .filter(|c| c["method"] == "Input.dispatchKeyEvent")
        .collect();
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0]["params"]["key"], "Enter");
    let query = cmds
        .iter()
        .find(|c| c["method"] == "DOM.querySelector")
        .unwrap();
    assert_eq!(query["params"]["selector"], "#login");
    driver.close().await;
}

#[tokio::test]
async fn liveview_form_presses_enter_and_settles() {
    let (addr, mut seen, _server) = start_scripted_server(browser_script).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    let started = Instant::now();
    framework::submit_form(&mut driver, PageKind::LiveView, "chat")
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(500));

    let cmds = drain(&mut seen);
    let names = methods(&cmds);
    assert!(!names.contains(&"Runtime.evaluate"), "no submit-button lookup");
    assert!(!names.contains(&"Input.dispatchMouseEvent"));
    assert_eq!(
        names.iter().filter(|m| **m == "Input.dispatchKeyEvent").count(),
        2
    );
    driver.close().await;
}

fn readiness_polls(cmds: &[Value]) -> usize {
    cmds.iter()
        .filter(|c| {
            c["params"]["expression"]
                .as_str()
                .is_some_and(|e| e.contains("document.readyState"))
        })
        .count()
}

#[tokio::test]
async fn script_that_stays_put_skips_the_readiness_wait() {
    let (addr, mut seen, _server) = start_scripted_server(plain_site).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    let started = Instant::now();
    framework::after_script(&mut driver, PageKind::Standard, "http://x.test/").await;
    assert!(started.elapsed() >= Duration::from_millis(200));

    let cmds = drain(&mut seen);
    assert_eq!(readiness_polls(&cmds), 0);
    driver.close().await;
}

#[tokio::test]
async fn script_that_navigates_waits_for_the_new_body() {
    let (addr, mut seen, _server) = start_scripted_server(plain_site).await;
    let dir = tempfile::tempdir().unwrap();
    let mut driver = attach(addr, dir.path(), "T1").await;

    framework::after_script(&mut driver, PageKind::Standard, "http://x.test/login").await;

    let cmds = drain(&mut seen);
    assert_eq!(readiness_polls(&cmds), 1);
    driver.close().await;
}

// =============================================================================
// Whole requests
// =============================================================================

const BANNER: &str = "==========================\nhttp://x.test/\n==========================\n\n";

fn request(url: &str) -> RequestConfig {
    RequestConfig {
        url: url.into(),
        profile: "default".into(),
        form_id: None,
        inputs: Vec::new(),
        after_submit: None,
        script: None,
        screenshot: None,
        truncate_after: 100_000,
        raw: false,
        headful: false,
        window_size: None,
        session: Some("work".into()),
        stealth: false,
    }
}

fn browser_options(command_timeout: Duration) -> BrowserOptions {
    BrowserOptions {
        executable: PathBuf::from("/nonexistent/chrome"),
        profile: "default".into(),
        headful: false,
        window_size: None,
        stealth: false,
        startup_timeout: Duration::from_secs(1),
        command_timeout,
    }
}

/// Tool directory whose `work` session points at the mock browser.
fn tool_dir_for(addr: SocketAddr, dir: &Path) -> ToolDir {
    let tool = ToolDir::at(dir);
    session::save(&tool.sessions_dir(), "work", &record(addr, "T1")).unwrap();
    tool
}

async fn fetch_from(
    script: Script,
    request: RequestConfig,
) -> (Result<String, surf::error::AppError>, Vec<Value>) {
    let (addr, mut seen, _server) = start_scripted_server(script).await;
    let dir = tempfile::tempdir().unwrap();
    let tool = tool_dir_for(addr, dir.path());
    let result = fetch::fetch(
        &request,
        &browser_options(Duration::from_secs(1)),
        &tool,
        Duration::from_secs(10),
    )
    .await;
    (result, drain(&mut seen))
}

#[tokio::test]
async fn fetch_prints_banner_markdown_and_console() {
    let (result, _) = fetch_from(plain_site, request("http://x.test/")).await;
    let out = result.unwrap();

    assert!(out.starts_with(BANNER), "{out}");
    assert!(out.contains("Hi"), "{out}");
    assert!(!out.contains("<h1>"), "{out}");
    let rule = "=".repeat(50);
    assert!(
        out.ends_with(&format!(
            "{rule}\nCONSOLE OUTPUT:\n{rule}\n[LOG] first\n[ERROR] Error: boom\n[WARNING] third\n"
        )),
        "{out}"
    );
}

#[tokio::test]
async fn raw_fetch_prints_only_markup() {
    let mut req = request("http://x.test/");
    req.raw = true;
    let (result, _) = fetch_from(plain_site, req).await;
    assert_eq!(result.unwrap(), "<html><body><h1>Hi</h1></body></html>");
}

#[tokio::test]
async fn rejected_stealth_script_is_tolerated() {
    let mut req = request("http://x.test/");
    req.stealth = true;
    let (result, cmds) = fetch_from(no_init_scripts_site, req).await;

    assert!(result.unwrap().starts_with(BANNER));
    assert!(methods(&cmds).contains(&"Page.addScriptToEvaluateOnNewDocument"));
}

#[tokio::test]
async fn unsettled_after_submit_page_is_tolerated() {
    let mut req = request("http://x.test/");
    req.after_submit = Some("http://x.test/after".into());
    let (result, cmds) = fetch_from(stalling_after_submit_site, req).await;

    assert!(result.unwrap().starts_with(BANNER));
    let navigations: Vec<&Value> = cmds
        .iter()
        .filter(|c| c["method"] == "Page.navigate")
        .collect();
    assert_eq!(navigations.len(), 2);
    assert_eq!(navigations[1]["params"]["url"], "http://x.test/after");
}

#[tokio::test]
async fn navigation_failure_is_fatal_with_context() {
    let (result, cmds) = fetch_from(plain_site, request("http://unreachable.test/")).await;

    let err = result.unwrap_err();
    assert!(
        err.message
            .starts_with("could not navigate to http://unreachable.test/: "),
        "{}",
        err.message
    );
    assert!(err.message.contains("ERR_NAME_NOT_RESOLVED"));
    assert!(!methods(&cmds).contains(&"DOM.getOuterHTML"));
}

#[tokio::test]
async fn form_fields_are_filled_then_submitted() {
    let mut req = request("http://x.test/");
    req.form_id = Some("login".into());
    req.inputs = vec![FormInput {
        name: "email".into(),
        value: "a@b.c".into(),
    }];
    let (result, cmds) = fetch_from(plain_site, req).await;
    result.unwrap();

    let typed = cmds
        .iter()
        .find(|c| c["method"] == "Input.insertText")
        .unwrap();
    assert_eq!(typed["params"]["text"], "a@b.c");
    let clear = cmds
        .iter()
        .find(|c| c["method"] == "Runtime.callFunctionOn")
        .unwrap();
    assert_eq!(clear["params"]["objectId"], "O5");
    let selectors: Vec<&str> = cmds
        .iter()
        .filter(|c| c["method"] == "DOM.querySelector")
        .filter_map(|c| c["params"]["selector"].as_str())
        .collect();
    assert!(selectors.contains(&"#login input[name='email']"));
    assert_eq!(
        methods(&cmds)
            .iter()
            .filter(|m| **m == "Input.dispatchMouseEvent")
            .count(),
        2
    );
}
