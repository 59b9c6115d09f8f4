use std::time::Duration;

use assault_engine::{ActionDispatcher, ClientSession, DispatchError, SessionError};
use assault_wire::{WireError, WireReader, WireSession, WireWriter, DEFAULT_RETRY_MS};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::config::{ClientConfig, ConfigError};

#[derive(Debug, Error)]
pub(crate) enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to connect to game server: {0}")]
    Connect(#[from] WireError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("failed to join room: {0}")]
    Join(#[from] SessionError),
}

pub(crate) struct AppWiring {
    pub(crate) config: ClientConfig,
    pub(crate) session: ClientSession<WireWriter>,
    pub(crate) reader: WireReader,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Assault Client Startup ===");

    let config = ClientConfig::from_env()?;
    let metrics = config.load_menu_metrics()?;
    info!(
        addr = %config.addr,
        room = %config.room,
        seat = %config.seat,
        create = config.create,
        fps = config.fps,
        "config_resolved"
    );

    let wire = WireSession::connect(
        &config.addr,
        config.connect_timeout,
        Duration::from_millis(DEFAULT_RETRY_MS),
    )?;
    let (writer, reader) = wire.split();
    let dispatcher = ActionDispatcher::new(config.room.clone(), config.seat, writer)?;
    let mut session = ClientSession::new(dispatcher, metrics, config.layout);

    if config.create {
        session.room_create(config.mode)?;
    } else {
        session.room_connect()?;
    }
    info!(room = %config.room, seat = %config.seat, "session_started");

    Ok(AppWiring {
        config,
        session,
        reader,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
