use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use assault_engine::{
    decode_server_message, ActionSink, DispatchError, OutboundAction, ServerMessage,
    SnapshotError,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RETRY_MS: u64 = 100;
pub const DEFAULT_QUIET_MS: u64 = 250;
pub const POLL_FRAME: &str = "{}";
const MAX_RETRY_BACKOFF_MS: u64 = 1_000;
const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum WireError {
    #[error("timed out connecting to {addr}")]
    ConnectTimeout { addr: String },
    #[error("failed to configure socket for {addr}: {source}")]
    Socket {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("socket read error while waiting for {waiting_for}: {source}")]
    Read {
        waiting_for: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("socket disconnected while waiting for {waiting_for}")]
    Disconnected { waiting_for: &'static str },
    #[error("timed out waiting for {waiting_for}")]
    Timeout { waiting_for: &'static str },
    #[error("failed to send line: {0}")]
    Write(#[source] io::Error),
    #[error("args are not valid json: {0}")]
    ArgsJson(#[source] serde_json::Error),
    #[error("failed to read script file '{path}': {source}")]
    Script {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

#[derive(Debug, Clone)]
pub struct CommonOptions {
    pub addr: String,
    pub timeout_ms: u64,
    pub retry_ms: u64,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_ms: DEFAULT_RETRY_MS,
        }
    }
}

pub enum CommandKind {
    WaitSnapshot,
    Send {
        room: String,
        action: String,
        args: String,
    },
    Script {
        room: String,
        path: String,
    },
}

pub struct WireSession {
    writer: WireWriter,
    reader: WireReader,
}

pub struct WireWriter {
    stream: TcpStream,
}

pub struct WireReader {
    reader: BufReader<TcpStream>,
    // Raw bytes of a partial line; decoded only once the line is complete.
    pending: Vec<u8>,
}

pub enum ReadOutcome {
    Line(String),
    NoData,
    Disconnected,
    DeadlineExceeded,
    IoError(io::Error),
}

impl WireSession {
    pub fn connect(addr: &str, timeout: Duration, retry_base: Duration) -> Result<Self, WireError> {
        let deadline = Instant::now() + timeout;
        let mut attempt = 0u32;

        while Instant::now() < deadline {
            match TcpStream::connect(addr) {
                Ok(stream) => return Self::from_stream(addr, stream),
                Err(error) => debug!(addr, attempt, error = %error, "wire_connect_retry"),
            }

            let sleep_for = backoff_delay(retry_base, attempt);
            if Instant::now() + sleep_for >= deadline {
                break;
            }
            thread::sleep(sleep_for);
            attempt = attempt.saturating_add(1);
        }

        Err(WireError::ConnectTimeout {
            addr: addr.to_string(),
        })
    }

    fn from_stream(addr: &str, stream: TcpStream) -> Result<Self, WireError> {
        let socket_error = |source| WireError::Socket {
            addr: addr.to_string(),
            source,
        };
        stream
            .set_read_timeout(Some(READ_POLL_INTERVAL))
            .map_err(socket_error)?;
        if let Err(error) = stream.set_nodelay(true) {
            debug!(addr, error = %error, "wire_nodelay_failed");
        }
        let reader_stream = stream.try_clone().map_err(socket_error)?;
        Ok(Self {
            writer: WireWriter { stream },
            reader: WireReader {
                reader: BufReader::new(reader_stream),
                pending: Vec::new(),
            },
        })
    }

    pub fn writer(&mut self) -> &mut WireWriter {
        &mut self.writer
    }

    pub fn reader(&mut self) -> &mut WireReader {
        &mut self.reader
    }

    pub fn split(self) -> (WireWriter, WireReader) {
        (self.writer, self.reader)
    }
}

impl WireWriter {
    pub fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.stream.write_all(line.as_bytes())?;
        self.stream.write_all(b"\n")?;
        self.stream.flush()
    }
}

impl ActionSink for WireWriter {
    fn send_action(&mut self, action: &OutboundAction) -> io::Result<()> {
        let line = serde_json::to_string(action)?;
        self.send_line(&line)
    }

    fn send_poll(&mut self) -> io::Result<()> {
        self.send_line(POLL_FRAME)
    }
}

impl WireReader {
    pub fn read_line(&mut self, deadline: Option<Instant>) -> ReadOutcome {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return ReadOutcome::DeadlineExceeded;
        }

        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) => ReadOutcome::Disconnected,
            Ok(_) => {
                let mut line_bytes = std::mem::take(&mut self.pending);
                if line_bytes.last().copied() == Some(b'\n') {
                    line_bytes.pop();
                }
                if line_bytes.last().copied() == Some(b'\r') {
                    line_bytes.pop();
                }
                match String::from_utf8(line_bytes) {
                    Ok(line) => ReadOutcome::Line(line),
                    Err(error) => {
                        warn!(error = %error, "wire_invalid_utf8_line_dropped");
                        ReadOutcome::NoData
                    }
                }
            }
            Err(error)
                if error.kind() == io::ErrorKind::WouldBlock
                    || error.kind() == io::ErrorKind::TimedOut =>
            {
                ReadOutcome::NoData
            }
            Err(error) => ReadOutcome::IoError(error),
        }
    }

    pub fn wait_for_game(&mut self, deadline: Instant) -> Result<ServerMessage, WireError> {
        const WAITING_FOR: &str = "a game snapshot";
        loop {
            match self.read_line(Some(deadline)) {
                ReadOutcome::Line(raw) if raw.trim().is_empty() => {}
                ReadOutcome::Line(raw) => {
                    let message = decode_server_message(&raw)?;
                    if message.game.is_some() {
                        return Ok(message);
                    }
                }
                ReadOutcome::NoData => {}
                ReadOutcome::Disconnected => {
                    return Err(WireError::Disconnected {
                        waiting_for: WAITING_FOR,
                    })
                }
                ReadOutcome::DeadlineExceeded => {
                    return Err(WireError::Timeout {
                        waiting_for: WAITING_FOR,
                    })
                }
                ReadOutcome::IoError(source) => {
                    return Err(WireError::Read {
                        waiting_for: WAITING_FOR,
                        source,
                    })
                }
            }
        }
    }
}

pub fn backoff_delay(retry_base: Duration, attempt: u32) -> Duration {
    let shift = attempt.min(8);
    let backoff_ms = (retry_base.as_millis() as u64)
        .saturating_mul(1u64 << shift)
        .min(MAX_RETRY_BACKOFF_MS);
    Duration::from_millis(backoff_ms.max(1))
}

pub fn parse_script_actions(content: &str) -> Vec<(String, String)> {
    let mut actions = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (action, args) = match trimmed.split_once(char::is_whitespace) {
            Some((action, args)) => (action, args.trim()),
            None => (trimmed, "[]"),
        };
        actions.push((action.to_string(), args.to_string()));
    }
    actions
}

/// An action token that parses as JSON is taken as that JSON value, so `3` or `null` are
/// rejected later as non-string actions; anything else is a plain action name.
pub fn parse_action_token(raw: &str) -> Value {
    serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn build_action(room: &str, action: &str, args: &str) -> Result<OutboundAction, WireError> {
    let args = serde_json::from_str::<Value>(args).map_err(WireError::ArgsJson)?;
    Ok(OutboundAction::from_raw(room, &parse_action_token(action), &args)?)
}

pub fn run<W: Write>(kind: CommandKind, opts: CommonOptions, stdout: &mut W) -> Result<(), WireError> {
    let timeout = Duration::from_millis(opts.timeout_ms);
    let retry_base = Duration::from_millis(opts.retry_ms.max(1));

    // Validate before touching the network.
    let actions = match &kind {
        CommandKind::WaitSnapshot => Vec::new(),
        CommandKind::Send { room, action, args } => vec![build_action(room, action, args)?],
        CommandKind::Script { room, path } => {
            let content = fs::read_to_string(path).map_err(|source| WireError::Script {
                path: path.clone(),
                source,
            })?;
            parse_script_actions(&content)
                .iter()
                .map(|(action, args)| build_action(room, action, args))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let mut session = WireSession::connect(&opts.addr, timeout, retry_base)?;
    match kind {
        CommandKind::WaitSnapshot => {
            let message = session.reader().wait_for_game(Instant::now() + timeout)?;
            emit_message(stdout, &message);
            Ok(())
        }
        CommandKind::Send { .. } | CommandKind::Script { .. } => {
            for action in &actions {
                session.writer().send_action(action).map_err(WireError::Write)?;
                let _ = writeln!(stdout, "sent: {}", action.action);
                read_until_quiet(
                    session.reader(),
                    timeout,
                    Duration::from_millis(DEFAULT_QUIET_MS),
                    |message| emit_message(stdout, message),
                )?;
            }
            Ok(())
        }
    }
}

fn read_until_quiet<F>(
    reader: &mut WireReader,
    timeout: Duration,
    quiet_window: Duration,
    mut on_message: F,
) -> Result<(), WireError>
where
    F: FnMut(&ServerMessage),
{
    const WAITING_FOR: &str = "server response";
    let deadline = Instant::now() + timeout;
    let mut last_line_at = Instant::now();
    let mut saw_any_line = false;

    loop {
        match reader.read_line(Some(deadline)) {
            ReadOutcome::Line(raw) => {
                if !raw.trim().is_empty() {
                    on_message(&decode_server_message(&raw)?);
                }
                saw_any_line = true;
                last_line_at = Instant::now();
            }
            ReadOutcome::NoData => {
                let now = Instant::now();
                if (saw_any_line && now.saturating_duration_since(last_line_at) >= quiet_window)
                    || (!saw_any_line && now + quiet_window >= deadline)
                {
                    return Ok(());
                }
            }
            ReadOutcome::Disconnected => {
                return Err(WireError::Disconnected {
                    waiting_for: WAITING_FOR,
                })
            }
            ReadOutcome::DeadlineExceeded => return Ok(()),
            ReadOutcome::IoError(source) => {
                return Err(WireError::Read {
                    waiting_for: WAITING_FOR,
                    source,
                })
            }
        }
    }
}

fn emit_message<W: Write>(stdout: &mut W, message: &ServerMessage) {
    if let Some(error) = &message.error {
        let _ = writeln!(stdout, "error: {error}");
    }
    if let Some(game) = &message.game {
        match game.tick {
            Some(tick) => {
                let _ = writeln!(stdout, "tick: {tick}");
            }
            None => {
                let _ = writeln!(stdout, "tick: not started");
            }
        }
    }
}
