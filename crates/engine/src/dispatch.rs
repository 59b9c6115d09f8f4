use std::io;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::resolver::Candidate;
use crate::snapshot::Seat;

pub const ROOM_CREATE: &str = "room_create";
pub const ROOM_CONNECT: &str = "room_connect";
pub const NEW_WAVE: &str = "new_wave";
pub const TOGGLE_MODE: &str = "toggle_mode";
pub const STEP: &str = "step";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("room id must not be empty")]
    EmptyRoom,
    #[error("no candidate to dispatch")]
    NoCandidate,
    #[error("action must be a string, got {found}")]
    ActionNotString { found: Value },
    #[error("action name must not be empty")]
    EmptyActionName,
    #[error("args for '{action}' must be a list, got {found}")]
    ArgsNotList { action: String, found: Value },
    #[error("encode args for '{action}': {source}")]
    Encode {
        action: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("send '{action}': {source}")]
    Transport {
        action: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomMode {
    Delay,
    Pause,
    FastForward,
}

impl RoomMode {
    pub fn code(self) -> i64 {
        match self {
            Self::Delay => 0,
            Self::Pause => 1,
            Self::FastForward => 2,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "delay" | "0" => Some(Self::Delay),
            "pause" | "1" => Some(Self::Pause),
            "fast" | "fast_forward" | "2" => Some(Self::FastForward),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundAction {
    pub room: String,
    pub action: String,
    pub args: Vec<Value>,
}

impl OutboundAction {
    pub fn from_raw(room: &str, action: &Value, args: &Value) -> Result<Self, DispatchError> {
        let Value::String(action) = action else {
            return Err(DispatchError::ActionNotString {
                found: action.clone(),
            });
        };
        if action.is_empty() {
            return Err(DispatchError::EmptyActionName);
        }
        let Value::Array(args) = args else {
            return Err(DispatchError::ArgsNotList {
                action: action.clone(),
                found: args.clone(),
            });
        };
        if room.is_empty() {
            return Err(DispatchError::EmptyRoom);
        }
        Ok(Self {
            room: room.to_string(),
            action: action.clone(),
            args: args.clone(),
        })
    }
}

pub trait ActionSink {
    fn send_action(&mut self, action: &OutboundAction) -> io::Result<()>;

    fn send_poll(&mut self) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Suppressed,
}

#[derive(Debug)]
pub struct ActionDispatcher<S> {
    room: String,
    seat: Seat,
    sink: S,
}

impl<S: ActionSink> ActionDispatcher<S> {
    pub fn new(room: impl Into<String>, seat: Seat, sink: S) -> Result<Self, DispatchError> {
        let room = room.into();
        if room.is_empty() {
            return Err(DispatchError::EmptyRoom);
        }
        Ok(Self { room, seat, sink })
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn seat(&self) -> Seat {
        self.seat
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn dispatch_first(
        &mut self,
        candidates: &[Candidate],
    ) -> Result<(DispatchOutcome, Candidate), DispatchError> {
        let candidate = candidates.first().ok_or(DispatchError::NoCandidate)?;
        let outcome = self.dispatch(candidate)?;
        Ok((outcome, candidate.clone()))
    }

    pub fn dispatch(&mut self, candidate: &Candidate) -> Result<DispatchOutcome, DispatchError> {
        let action = candidate.action.as_str();
        let args = serde_json::to_value(&candidate.args).map_err(|source| DispatchError::Encode {
            action: action.to_string(),
            source,
        })?;
        self.send_raw(&Value::from(action), &args)
    }

    pub fn send_raw(&mut self, action: &Value, args: &Value) -> Result<DispatchOutcome, DispatchError> {
        let outbound = OutboundAction::from_raw(&self.room, action, args)?;
        if self.seat == Seat::Spectator && outbound.action != ROOM_CONNECT {
            debug!(action = %outbound.action, "spectator_action_suppressed");
            return Ok(DispatchOutcome::Suppressed);
        }
        self.sink
            .send_action(&outbound)
            .map_err(|source| DispatchError::Transport {
                action: outbound.action.clone(),
                source,
            })?;
        debug!(room = %outbound.room, action = %outbound.action, "action_sent");
        Ok(DispatchOutcome::Sent)
    }

    pub fn room_create(&mut self, mode: RoomMode) -> Result<DispatchOutcome, DispatchError> {
        info!(room = %self.room, seat = %self.seat, mode = mode.code(), "room_create");
        let args = Value::from(vec![Value::from(self.seat.letter().to_string()), Value::from(mode.code())]);
        self.send_raw(&Value::from(ROOM_CREATE), &args)
    }

    pub fn room_connect(&mut self) -> Result<DispatchOutcome, DispatchError> {
        info!(room = %self.room, seat = %self.seat, "room_connect");
        let args = Value::from(vec![Value::from(self.seat.letter().to_string())]);
        self.send_raw(&Value::from(ROOM_CONNECT), &args)
    }

    pub fn new_wave(&mut self, wave: i64, runner_movements: &str) -> Result<DispatchOutcome, DispatchError> {
        let args = Value::from(vec![Value::from(wave), Value::from(runner_movements)]);
        self.send_raw(&Value::from(NEW_WAVE), &args)
    }

    pub fn toggle_mode(&mut self, mode: RoomMode) -> Result<DispatchOutcome, DispatchError> {
        let args = Value::from(vec![Value::from(mode.code())]);
        self.send_raw(&Value::from(TOGGLE_MODE), &args)
    }

    pub fn step(&mut self) -> Result<DispatchOutcome, DispatchError> {
        self.send_raw(&Value::from(STEP), &Value::Array(Vec::new()))
    }

    pub fn poll(&mut self) -> Result<(), DispatchError> {
        self.sink
            .send_poll()
            .map_err(|source| DispatchError::Transport {
                action: "poll".to_string(),
                source,
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingSink {
    pub actions: Vec<OutboundAction>,
    pub polls: usize,
}

impl ActionSink for RecordingSink {
    fn send_action(&mut self, action: &OutboundAction) -> io::Result<()> {
        self.actions.push(action.clone());
        Ok(())
    }

    fn send_poll(&mut self) -> io::Result<()> {
        self.polls += 1;
        Ok(())
    }
}
