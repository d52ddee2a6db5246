//! Unix socket listener: one request per connection, one thread per connection.

use fs_err as fs;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use partner_protocol::{
    parse_evolve_prompts, parse_panel_hover, parse_report_screen, parse_set_dock,
    parse_set_pinned, parse_update_state, ErrorInfo, Method, Request, Response, MAX_REQUEST_BYTES,
    PROTOCOL_VERSION,
};
use serde::Serialize;

use crate::host::Host;

const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Creates the socket directory and clears a stale socket from a previous run.
pub fn prepare_socket(socket_path: &Path) -> Result<(), String> {
    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent).map_err(|err| err.to_string())?;
    }
    match fs::remove_file(socket_path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err.to_string()),
        _ => Ok(()),
    }
}

/// Serves requests until a `shutdown` request arrives, then removes the socket.
pub fn serve(listener: UnixListener, socket_path: PathBuf, host: Arc<Host>) {
    let socket_path = Arc::new(socket_path);

    for stream in listener.incoming() {
        if host.is_shutting_down() {
            break;
        }
        match stream {
            Ok(stream) => {
                let host = Arc::clone(&host);
                let socket_path = Arc::clone(&socket_path);
                thread::spawn(move || handle_connection(stream, &host, &socket_path));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept connection");
            }
        }
    }

    if let Err(err) = fs::remove_file(socket_path.as_path()) {
        warn!(error = %err, "Failed to remove socket on exit");
    }
    info!("Listener stopped");
}

fn handle_connection(stream: UnixStream, host: &Host, socket_path: &Path) {
    let _ = stream.set_read_timeout(Some(READ_TIMEOUT));
    let (method, response) = match read_request(&stream) {
        Ok(request) => {
            tracing::debug!(method = ?request.method, id = ?request.id, "Request received");
            (Some(request.method), handle_request(request, host))
        }
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Rejected request");
            (None, Response::error_with_info(None, err))
        }
    };
    if let Err(err) = write_response(&stream, &response) {
        tracing::debug!(error = %err, "Client went away before the response");
    }

    if method == Some(Method::Shutdown) {
        // Unblocks the accept loop so it observes the shutdown flag.
        let _ = UnixStream::connect(socket_path);
    }
}

/// Reads one newline-terminated request, at most `MAX_REQUEST_BYTES` long.
fn read_request(source: impl Read) -> Result<Request, ErrorInfo> {
    let mut reader = BufReader::new(source).take(MAX_REQUEST_BYTES as u64 + 1);
    let mut line = Vec::new();
    if let Err(err) = reader.read_until(b'\n', &mut line) {
        return Err(match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                ErrorInfo::new("read_timeout", "request timed out")
            }
            _ => ErrorInfo::new("read_error", format!("failed to read request: {}", err)),
        });
    }

    let body = line.strip_suffix(b"\n").unwrap_or(&line);
    if body.len() > MAX_REQUEST_BYTES {
        return Err(ErrorInfo::new(
            "request_too_large",
            format!("request exceeded {} bytes", MAX_REQUEST_BYTES),
        ));
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(body)
        .map_err(|err| ErrorInfo::new("invalid_json", format!("request was not valid JSON: {}", err)))
}

fn to_response<T: Serialize>(id: Option<String>, value: &T, what: &str) -> Response {
    match serde_json::to_value(value) {
        Ok(value) => Response::ok(id, value),
        Err(err) => Response::error(
            id,
            "serialization_error",
            format!("Failed to serialize {}: {}", what, err),
        ),
    }
}

fn state_response<T: Serialize>(id: Option<String>, result: Result<T, ErrorInfo>) -> Response {
    match result {
        Ok(state) => to_response(id, &state, "state"),
        Err(err) => Response::error_with_info(id, err),
    }
}

fn accepted(id: Option<String>) -> Response {
    Response::ok(id, serde_json::json!({ "accepted": true }))
}

pub(crate) fn handle_request(request: Request, host: &Host) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    let id = request.id;
    let params = request.params;

    match request.method {
        Method::GetHealth => Response::ok(
            id,
            serde_json::json!({
                "status": "ok",
                "pid": std::process::id(),
                "version": env!("CARGO_PKG_VERSION"),
                "protocol_version": PROTOCOL_VERSION,
                "state_path": host.state_path(),
            }),
        ),
        Method::GetState => to_response(id, &host.state(), "state"),
        Method::UpdateState => match parse_update_state(params) {
            Ok(partial) => state_response(id, host.update_state(&partial)),
            Err(err) => Response::error_with_info(id, err),
        },
        Method::EvolvePrompts => match parse_evolve_prompts(params) {
            Ok(parsed) => {
                let outcome = host.evolve_prompts(parsed.state.as_ref(), parsed.limit);
                to_response(id, &outcome, "suggestions")
            }
            Err(err) => Response::error_with_info(id, err),
        },
        Method::PanelHover => match parse_panel_hover(params) {
            Ok(hovering) => {
                host.panel_hover(hovering);
                accepted(id)
            }
            Err(err) => Response::error_with_info(id, err),
        },
        Method::SetPinned => match parse_set_pinned(params) {
            Ok(pinned) => {
                info!(pinned, "Pin preference changed");
                state_response(id, host.set_pinned(pinned))
            }
            Err(err) => Response::error_with_info(id, err),
        },
        Method::SetDock => match parse_set_dock(params) {
            Ok(side) => {
                info!(dock = side.as_str(), "Dock side changed");
                state_response(id, host.set_dock(side))
            }
            Err(err) => Response::error_with_info(id, err),
        },
        Method::Hotkey => state_response(id, host.hotkey()),
        Method::ReportScreen => match parse_report_screen(params) {
            Ok(report) => {
                host.report_screen(report);
                to_response(id, &host.panel_snapshot(), "panel")
            }
            Err(err) => Response::error_with_info(id, err),
        },
        Method::GetPanel => to_response(id, &host.panel_snapshot(), "panel"),
        Method::WindowClosed => {
            host.window_closed();
            accepted(id)
        }
        Method::WindowBlurred => {
            host.window_blurred();
            accepted(id)
        }
        Method::TakeEvents => to_response(id, &host.take_events(), "events"),
        Method::Shutdown => {
            host.shutdown();
            accepted(id)
        }
    }
}

fn write_response(mut sink: impl Write, response: &Response) -> std::io::Result<()> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    sink.write_all(&payload)?;
    sink.flush()
}
