use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use assault_engine::{
    ActionSink, ClickEvent, ClickOutcome, ClientSession, DispatchOutcome, MessageOutcome,
    SessionError, SurfaceLayout,
};
use assault_wire::{ReadOutcome, WireReader};
use tracing::{debug, error, info, trace, warn};

use super::bootstrap::AppWiring;
use super::commands::{parse_input_line, InputCommand};

#[derive(Debug)]
pub(crate) enum LoopEvent {
    ServerLine(String),
    ServerClosed,
    Input(String),
    InputClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopFlow {
    Continue,
    Quit,
    Failed,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut session,
        reader,
    } = app;
    let (tx, rx) = mpsc::channel();
    let shutdown = Arc::new(AtomicBool::new(false));

    if let Err(err) = spawn_server_reader(reader, tx.clone(), Arc::clone(&shutdown)) {
        error!(error = %err, "spawn_server_reader_failed");
        return ExitCode::FAILURE;
    }
    if let Err(err) = spawn_input_reader(tx) {
        error!(error = %err, "spawn_input_reader_failed");
        return ExitCode::FAILURE;
    }

    let frame_interval = config.frame_interval();
    let mut next_frame = Instant::now() + frame_interval;
    let flow = loop {
        let wait = next_frame.saturating_duration_since(Instant::now());
        let flow = match rx.recv_timeout(wait) {
            Ok(event) => handle_event(&mut session, &config.layout, event),
            Err(RecvTimeoutError::Timeout) => {
                next_frame += frame_interval;
                run_frame(&mut session)
            }
            Err(RecvTimeoutError::Disconnected) => LoopFlow::Quit,
        };
        if flow != LoopFlow::Continue {
            break flow;
        }
    };
    shutdown.store(true, Ordering::Relaxed);

    match flow {
        LoopFlow::Failed => ExitCode::FAILURE,
        LoopFlow::Continue | LoopFlow::Quit => {
            info!("client_shutdown");
            ExitCode::SUCCESS
        }
    }
}

fn spawn_server_reader(
    mut reader: WireReader,
    tx: Sender<LoopEvent>,
    shutdown: Arc<AtomicBool>,
) -> io::Result<()> {
    thread::Builder::new()
        .name("server-reader".to_string())
        .spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                match reader.read_line(None) {
                    ReadOutcome::Line(line) => {
                        if tx.send(LoopEvent::ServerLine(line)).is_err() {
                            return;
                        }
                    }
                    ReadOutcome::NoData | ReadOutcome::DeadlineExceeded => {}
                    ReadOutcome::Disconnected => break,
                    ReadOutcome::IoError(err) => {
                        warn!(error = %err, "server_read_failed");
                        break;
                    }
                }
            }
            let _ = tx.send(LoopEvent::ServerClosed);
        })?;
    Ok(())
}

fn spawn_input_reader(tx: Sender<LoopEvent>) -> io::Result<()> {
    thread::Builder::new()
        .name("input-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(LoopEvent::Input(line)).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "input_read_failed");
                        break;
                    }
                }
            }
            let _ = tx.send(LoopEvent::InputClosed);
        })?;
    Ok(())
}

pub(crate) fn handle_event<S: ActionSink>(
    session: &mut ClientSession<S>,
    layout: &SurfaceLayout,
    event: LoopEvent,
) -> LoopFlow {
    match event {
        LoopEvent::ServerLine(line) => {
            if line.trim().is_empty() {
                return LoopFlow::Continue;
            }
            match session.receive_message(&line) {
                Ok(MessageOutcome::Installed { version, started }) => {
                    trace!(version, started, "snapshot_installed");
                }
                Ok(MessageOutcome::NoGame) => {}
                Err(err) => warn!(error = %err, "server_message_rejected"),
            }
            LoopFlow::Continue
        }
        LoopEvent::ServerClosed => {
            error!("server_disconnected");
            LoopFlow::Failed
        }
        LoopEvent::Input(line) => match parse_input_line(&line) {
            Ok(Some(command)) => run_command(session, layout, command),
            Ok(None) => LoopFlow::Continue,
            Err(err) => {
                warn!(error = %err, line = %line, "input_rejected");
                LoopFlow::Continue
            }
        },
        LoopEvent::InputClosed => {
            debug!("input_closed");
            LoopFlow::Continue
        }
    }
}

fn run_command<S: ActionSink>(
    session: &mut ClientSession<S>,
    layout: &SurfaceLayout,
    command: InputCommand,
) -> LoopFlow {
    let result = match command {
        InputCommand::Click {
            surface,
            button,
            position_px,
        } => session
            .handle_click(ClickEvent {
                surface,
                button,
                position_px,
            })
            .map(log_click_outcome),
        InputCommand::Move { position_px } => {
            session.handle_pointer_motion(layout.surface_at(position_px), position_px);
            Ok(())
        }
        InputCommand::Wave {
            number,
            runner_movements,
        } => session
            .new_wave(number, &runner_movements)
            .map(|outcome| log_room_action("new_wave", outcome)),
        InputCommand::Mode(mode) => session
            .toggle_mode(mode)
            .map(|outcome| log_room_action("toggle_mode", outcome)),
        InputCommand::Step => session
            .step()
            .map(|outcome| log_room_action("step", outcome)),
        InputCommand::Quit => return LoopFlow::Quit,
    };

    match result {
        Ok(()) => LoopFlow::Continue,
        Err(err @ SessionError::Dispatch(assault_engine::DispatchError::Transport { .. })) => {
            error!(error = %err, "transport_failed");
            LoopFlow::Failed
        }
        Err(err) => {
            warn!(error = %err, "command_failed");
            LoopFlow::Continue
        }
    }
}

fn run_frame<S: ActionSink>(session: &mut ClientSession<S>) -> LoopFlow {
    if let Err(err) = session.poll() {
        error!(error = %err, "poll_failed");
        return LoopFlow::Failed;
    }
    session.advance_frame();
    let view = session.render_view();
    trace!(
        version = view.version,
        tick = ?view.tick,
        menu_rows = view.menu.as_ref().map_or(0, |menu| menu.rows.len()),
        hover = ?view.hover.as_ref().and_then(|hover| hover.candidate.as_ref()).map(|c| c.label.as_str()),
        "frame"
    );
    LoopFlow::Continue
}

fn log_click_outcome(outcome: ClickOutcome) {
    match outcome {
        ClickOutcome::NotReady => debug!("click_before_game_start"),
        ClickOutcome::Ignored => debug!("click_ignored"),
        ClickOutcome::Dispatched { candidate, outcome }
        | ClickOutcome::MenuSelected { candidate, outcome } => info!(
            label = %candidate.label,
            action = %candidate.action,
            sent = outcome == DispatchOutcome::Sent,
            "action_dispatched"
        ),
        ClickOutcome::MenuOpened { options } => debug!(options, "menu_opened"),
        ClickOutcome::MenuAbsorbed => debug!("menu_click_absorbed"),
    }
}

fn log_room_action(action: &'static str, outcome: DispatchOutcome) {
    info!(action, sent = outcome == DispatchOutcome::Sent, "room_action");
}
