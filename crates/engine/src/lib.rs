pub mod dispatch;
pub mod input;
pub mod menu;
pub mod resolver;
pub mod session;
pub mod snapshot;
pub mod spatial_index;

pub use dispatch::{
    ActionDispatcher, ActionSink, DispatchError, DispatchOutcome, OutboundAction, RecordingSink,
    RoomMode,
};
pub use input::{
    pixel_to_slot, pixel_to_tile, ClickEvent, ClickSurface, MouseButton, SlotCoord,
    SurfaceLayout, TileCoord, Vec2,
};
pub use menu::{
    ContextMenu, LabelMetrics, MenuClick, MenuMetrics, MenuMetricsError, MenuRect, MenuView,
};
pub use resolver::{
    resolve_click, resolve_inventory_click, resolve_map_click, ActionArg, ActionName, Candidate,
    CandidateBuffers, ClickTarget, ResolveError,
};
pub use session::{
    ClickMarker, ClickOutcome, ClientSession, HoverView, MarkerColor, MessageOutcome,
    RenderView, SessionError, StatusView, TickState,
};
pub use snapshot::{
    decode_server_message, ItemKind, Role, Seat, SeatParseError, ServerMessage, Snapshot,
    SnapshotError, Species,
};
pub use spatial_index::{SpatialIndex, TileCategory};
