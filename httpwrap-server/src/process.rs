use std::process::Stdio;

use chrono::Utc;
use httpwrap_api::api::{CommandResponse, Endpoint};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio_util::sync::CancellationToken;

/// Exit code reported for a process terminated by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// Runs the command of `endpoint` once with the final `arguments`.
///
/// The child is killed if `cancel` fires or the returned future is dropped before it exited.
/// `stdin` is only connected if the endpoint allows it.
/// Failing to start is reported through [`CommandResponse::error`], this never errors.
pub async fn invoke<R>(
    id: u64,
    endpoint: &Endpoint,
    arguments: Vec<String>,
    cancel: &CancellationToken,
    stdin: Option<R>,
) -> CommandResponse
where
    R: AsyncRead + Unpin,
{
    let stdin = stdin.filter(|_| endpoint.allow_stdin);

    let mut command = Command::new(&endpoint.command);
    command
        .args(&arguments)
        .kill_on_drop(true)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(capture_or_null(endpoint.discard_stdout))
        .stderr(capture_or_null(endpoint.discard_stderr));

    log::debug!(id; "command: {}", endpoint.command);
    log::debug!(id; "arguments: {arguments:?}");

    let start_time = Utc::now();
    if cancel.is_cancelled() {
        log::info!(id; "cancelled before start");
        return start_failure(start_time, "context canceled");
    }
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            log::info!(id; "failed to start: {e}");
            return start_failure(start_time, &format!("failed to start command: {e}"));
        }
    };

    let feed = feed_stdin(id, child.stdin.take(), stdin);
    let stdout = read_all(child.stdout.take());
    let stderr = read_all(child.stderr.take());
    let wait = async {
        tokio::select! {
            status = child.wait() => status,
            () = cancel.cancelled() => {
                log::info!(id; "cancelled, killing process");
                if let Err(e) = child.start_kill() {
                    log::warn!(id; "failed to kill process: {e}");
                }
                child.wait().await
            }
        }
    };
    let ((), stdout, stderr, status) = tokio::join!(feed, stdout, stderr, wait);
    let end_time = Utc::now();

    let exit_code = match status {
        Ok(status) => {
            log::debug!(id; "status: {status}");
            status.code().unwrap_or(SIGNAL_EXIT_CODE)
        }
        Err(e) => {
            log::warn!(id; "failed to wait for process: {e}");
            SIGNAL_EXIT_CODE
        }
    };

    CommandResponse {
        start_time,
        end_time,
        stdout,
        stderr,
        exit_code: Some(exit_code),
        error: None,
    }
}

fn capture_or_null(discard: bool) -> Stdio {
    if discard {
        Stdio::null()
    } else {
        Stdio::piped()
    }
}

fn start_failure(start_time: chrono::DateTime<Utc>, error: &str) -> CommandResponse {
    CommandResponse {
        start_time,
        end_time: Utc::now(),
        stdout: None,
        stderr: None,
        exit_code: None,
        error: Some(error.to_owned()),
    }
}

/// Copies all input to the process and closes its stdin afterwards.
async fn feed_stdin<R>(id: u64, pipe: Option<ChildStdin>, input: Option<R>)
where
    R: AsyncRead + Unpin,
{
    let (Some(mut pipe), Some(mut input)) = (pipe, input) else {
        return;
    };
    // A process may exit without reading everything, that is not an error of the request.
    match tokio::io::copy(&mut input, &mut pipe).await {
        Ok(bytes) => log::trace!(id, bytes; "fed stdin"),
        Err(e) => log::debug!(id; "stdin closed early: {e}"),
    }
    if let Err(e) = pipe.shutdown().await {
        log::debug!(id; "failed to close stdin: {e}");
    }
}

/// Reads a pipe until EOF, `None` if the stream is not captured.
async fn read_all<P>(pipe: Option<P>) -> Option<String>
where
    P: AsyncRead + Unpin,
{
    let mut pipe = pipe?;
    let mut buffer = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut buffer).await {
        log::warn!("failed to read process output: {e}");
    }
    Some(String::from_utf8_lossy(&buffer).into_owned())
}
