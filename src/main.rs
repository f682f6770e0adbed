use resultd::ipc;
use std::io::{self, BufRead, Write};

fn write_line(stdout: &mut impl Write, resp: &serde_json::Value) -> io::Result<()> {
    let line = serde_json::to_string(resp).unwrap_or_else(|_| "{\"ok\":false}".to_string());
    writeln!(stdout, "{}", line)?;
    stdout.flush()
}

fn main() {
    // stdout carries responses only; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut state = ipc::AppState::default();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                log::error!("stdin read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                log::warn!("unparseable request: {e}");
                ipc::bad_json(e.to_string())
            }
        };
        if let Err(e) = write_line(&mut stdout, &resp) {
            log::error!("stdout write failed: {e}");
            break;
        }
    }
}
