use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dispatch::{ActionDispatcher, ActionSink, DispatchError, DispatchOutcome, RoomMode};
use crate::input::{ClickEvent, ClickSurface, MouseButton, SurfaceLayout, TileCoord, Vec2};
use crate::menu::{ContextMenu, MenuClick, MenuMetrics, MenuView};
use crate::resolver::{resolve_click, ActionName, Candidate, ClickTarget, ResolveError};
use crate::snapshot::{decode_server_message, Seat, Snapshot, SnapshotError};
use crate::spatial_index::SpatialIndex;

pub const CLICK_MARKER_FRAMES: u8 = 4;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Clone, Default)]
pub struct TickState {
    version: u64,
    snapshot: Snapshot,
    index: SpatialIndex,
}

impl TickState {
    pub fn new(version: u64, snapshot: Snapshot) -> Self {
        let index = SpatialIndex::rebuild(&snapshot);
        Self {
            version,
            snapshot,
            index,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    Installed { version: u64, started: bool },
    NoGame,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    NotReady,
    Ignored,
    Dispatched {
        candidate: Candidate,
        outcome: DispatchOutcome,
    },
    MenuOpened {
        options: usize,
    },
    MenuSelected {
        candidate: Candidate,
        outcome: DispatchOutcome,
    },
    MenuAbsorbed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerColor {
    Yellow,
    Red,
}

impl MarkerColor {
    fn for_action(action: ActionName) -> Self {
        match action {
            ActionName::ClickMove => Self::Yellow,
            _ => Self::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickMarker {
    pub position_px: Vec2,
    pub color: MarkerColor,
    pub frame: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoverView {
    pub tile: TileCoord,
    pub candidate: Option<Candidate>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusView {
    pub wave: Option<i64>,
    pub relative_tick: Option<i64>,
    pub trap_charges: Option<i64>,
    pub received_call: Option<i64>,
    pub correct_call: Option<i64>,
    pub required_call: Option<i64>,
    pub sent_call: Option<i64>,
    pub text: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderView {
    pub version: u64,
    pub tick: Option<u64>,
    pub menu: Option<MenuView>,
    pub hover: Option<HoverView>,
    pub click_marker: Option<ClickMarker>,
    pub status: StatusView,
}

#[derive(Debug)]
pub struct ClientSession<S> {
    state: TickState,
    menu: ContextMenu,
    menu_surface: Option<ClickSurface>,
    metrics: MenuMetrics,
    layout: SurfaceLayout,
    dispatcher: ActionDispatcher<S>,
    hovered_tile: Option<TileCoord>,
    click_marker: Option<ClickMarker>,
}

impl<S: ActionSink> ClientSession<S> {
    pub fn new(dispatcher: ActionDispatcher<S>, metrics: MenuMetrics, layout: SurfaceLayout) -> Self {
        Self {
            state: TickState::default(),
            menu: ContextMenu::default(),
            menu_surface: None,
            metrics,
            layout,
            dispatcher,
            hovered_tile: None,
            click_marker: None,
        }
    }

    pub fn seat(&self) -> Seat {
        self.dispatcher.seat()
    }

    pub fn state(&self) -> &TickState {
        &self.state
    }

    pub fn menu(&self) -> &ContextMenu {
        &self.menu
    }

    pub fn dispatcher(&self) -> &ActionDispatcher<S> {
        &self.dispatcher
    }

    pub fn is_ready(&self) -> bool {
        self.state.snapshot().is_started()
    }

    pub fn receive_message(&mut self, raw: &str) -> Result<MessageOutcome, SessionError> {
        let message = decode_server_message(raw)?;
        if let Some(error) = &message.error {
            warn!(error = %error, "server_error");
        }
        let Some(snapshot) = message.game else {
            return Ok(MessageOutcome::NoGame);
        };
        let started = snapshot.is_started();
        let was_ready = self.is_ready();
        let version = self.state.version() + 1;
        self.state = TickState::new(version, snapshot);
        if started && !was_ready {
            info!(version, seat = %self.seat(), "game_started");
        }
        Ok(MessageOutcome::Installed { version, started })
    }

    pub fn handle_click(&mut self, event: ClickEvent) -> Result<ClickOutcome, SessionError> {
        if !self.is_ready() {
            return Ok(ClickOutcome::NotReady);
        }
        match event.button {
            MouseButton::Primary => self.handle_primary_click(event),
            MouseButton::Secondary => self.handle_secondary_click(event),
        }
    }

    fn handle_primary_click(&mut self, event: ClickEvent) -> Result<ClickOutcome, SessionError> {
        let menu_surface = self.menu_surface.take();
        match self.menu.click(event.position_px) {
            MenuClick::Selected(candidate) => {
                let outcome = self.dispatcher.dispatch(&candidate)?;
                if menu_surface == Some(ClickSurface::Map) {
                    self.start_click_marker(event.position_px, candidate.action);
                }
                debug!(label = %candidate.label, "menu_selected");
                return Ok(ClickOutcome::MenuSelected { candidate, outcome });
            }
            MenuClick::Absorbed => return Ok(ClickOutcome::MenuAbsorbed),
            MenuClick::Outside => {}
        }

        let Some(target) = self.click_target(event) else {
            return Ok(ClickOutcome::Ignored);
        };
        let candidates = self.resolve(target, MouseButton::Primary)?;
        let (outcome, candidate) = self.dispatcher.dispatch_first(&candidates)?;
        if matches!(target, ClickTarget::Map(_)) {
            self.start_click_marker(event.position_px, candidate.action);
        }
        Ok(ClickOutcome::Dispatched { candidate, outcome })
    }

    fn handle_secondary_click(&mut self, event: ClickEvent) -> Result<ClickOutcome, SessionError> {
        let Some(target) = self.click_target(event) else {
            return Ok(ClickOutcome::Ignored);
        };
        let candidates = match self.resolve(target, MouseButton::Secondary) {
            Ok(candidates) => candidates,
            Err(err) => {
                self.menu.close();
                self.menu_surface = None;
                return Err(err.into());
            }
        };
        let options = candidates.len();
        self.menu.open(event.position_px, candidates, &self.metrics);
        self.menu_surface = Some(event.surface);
        self.click_marker = None;
        Ok(ClickOutcome::MenuOpened { options })
    }

    pub fn handle_pointer_motion(&mut self, surface: ClickSurface, position_px: Vec2) {
        if self.menu.pointer_moved(position_px) {
            self.menu_surface = None;
            debug!("menu_dismissed");
        }
        self.hovered_tile = match surface {
            ClickSurface::Map => Some(self.layout.map_tile_at(position_px)),
            ClickSurface::Inventory | ClickSurface::Chrome => None,
        };
    }

    pub fn advance_frame(&mut self) {
        if let Some(marker) = &mut self.click_marker {
            marker.frame += 1;
            if marker.frame >= CLICK_MARKER_FRAMES {
                self.click_marker = None;
            }
        }
    }

    pub fn render_view(&self) -> RenderView {
        let snapshot = self.state.snapshot();
        RenderView {
            version: self.state.version(),
            tick: snapshot.tick,
            menu: self.menu.view(&self.metrics),
            hover: self.hover_view(),
            click_marker: self.click_marker,
            status: self.status_view(),
        }
    }

    pub fn room_create(&mut self, mode: RoomMode) -> Result<DispatchOutcome, SessionError> {
        Ok(self.dispatcher.room_create(mode)?)
    }

    pub fn room_connect(&mut self) -> Result<DispatchOutcome, SessionError> {
        Ok(self.dispatcher.room_connect()?)
    }

    pub fn new_wave(&mut self, wave: i64, runner_movements: &str) -> Result<DispatchOutcome, SessionError> {
        Ok(self.dispatcher.new_wave(wave, runner_movements)?)
    }

    pub fn toggle_mode(&mut self, mode: RoomMode) -> Result<DispatchOutcome, SessionError> {
        Ok(self.dispatcher.toggle_mode(mode)?)
    }

    pub fn step(&mut self) -> Result<DispatchOutcome, SessionError> {
        Ok(self.dispatcher.step()?)
    }

    pub fn poll(&mut self) -> Result<(), SessionError> {
        Ok(self.dispatcher.poll()?)
    }

    fn click_target(&self, event: ClickEvent) -> Option<ClickTarget> {
        match event.surface {
            ClickSurface::Map => Some(ClickTarget::Map(self.layout.map_tile_at(event.position_px))),
            ClickSurface::Inventory => Some(ClickTarget::Inventory(
                self.layout.inventory_slot_at(event.position_px),
            )),
            ClickSurface::Chrome => None,
        }
    }

    fn resolve(&self, target: ClickTarget, button: MouseButton) -> Result<Vec<Candidate>, ResolveError> {
        resolve_click(
            target,
            button,
            self.seat(),
            self.state.snapshot(),
            self.state.index(),
        )
    }

    fn start_click_marker(&mut self, position_px: Vec2, action: ActionName) {
        self.click_marker = Some(ClickMarker {
            position_px,
            color: MarkerColor::for_action(action),
            frame: 0,
        });
    }

    fn hover_view(&self) -> Option<HoverView> {
        let tile = self.hovered_tile?;
        if !self.is_ready() {
            return None;
        }
        let candidate = self
            .resolve(ClickTarget::Map(tile), MouseButton::Primary)
            .ok()
            .and_then(|candidates| candidates.into_iter().next());
        Some(HoverView { tile, candidate })
    }

    fn status_view(&self) -> StatusView {
        let snapshot = self.state.snapshot();
        let wave = &snapshot.wave;
        let player = self.seat().role().and_then(|role| snapshot.player(role));
        StatusView {
            wave: wave.number.map(|number| number + 1),
            relative_tick: wave.relative_tick,
            trap_charges: wave.game_objects.trap.as_ref().and_then(|trap| trap.charges),
            received_call: player.and_then(|p| p.received_call),
            correct_call: player.and_then(|p| p.correct_call),
            required_call: player.and_then(|p| p.required_call),
            sent_call: player.and_then(|p| p.sent_call),
            text: snapshot.text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RecordingSink;
    use crate::menu::LabelMetrics;
    use crate::resolver::ActionArg;
    use crate::snapshot::Role;
    use serde_json::json;

    const MAP_ORIGIN: Vec2 = Vec2::new(0.0, 0.0);
    const INVENTORY_ORIGIN: Vec2 = Vec2::new(800.0, 0.0);

    fn session(seat: Seat) -> ClientSession<RecordingSink> {
        let dispatcher =
            ActionDispatcher::new("room-7", seat, RecordingSink::default()).expect("dispatcher");
        let metrics = MenuMetrics {
            header: LabelMetrics::new(60.0, 20.0),
            footer: LabelMetrics::new(60.0, 5.0),
            right_border_width: 2.0,
            ..MenuMetrics::default()
        };
        ClientSession::new(
            dispatcher,
            metrics,
            SurfaceLayout {
                map_origin_px: MAP_ORIGIN,
                inventory_origin_px: INVENTORY_ORIGIN,
            },
        )
    }

    fn tile_center(col: i32, row: i32) -> Vec2 {
        Vec2::new(col as f32 * 20.0 + 10.0, row as f32 * 20.0 + 10.0)
    }

    fn sent_actions(session: &ClientSession<RecordingSink>) -> Vec<(String, Vec<serde_json::Value>)> {
        session
            .dispatcher()
            .sink()
            .actions
            .iter()
            .map(|a| (a.action.clone(), a.args.clone()))
            .collect()
    }

    fn game(value: serde_json::Value) -> String {
        json!({ "game": value }).to_string()
    }

    #[test]
    fn clicks_before_the_game_starts_do_nothing() {
        let mut session = session(Seat::Player(Role::Defender));
        assert_eq!(
            session
                .receive_message(r#"{"game": {"tick": null}}"#)
                .expect("decode"),
            MessageOutcome::Installed {
                version: 1,
                started: false
            }
        );
        let outcome = session
            .handle_click(ClickEvent::primary(ClickSurface::Map, tile_center(1, 1)))
            .expect("click");
        assert_eq!(outcome, ClickOutcome::NotReady);
        assert!(sent_actions(&session).is_empty());
    }

    #[test]
    fn message_without_game_keeps_current_state() {
        let mut session = session(Seat::Player(Role::Defender));
        session
            .receive_message(&game(json!({"tick": 4})))
            .expect("decode");
        let outcome = session
            .receive_message(r#"{"error": "room full"}"#)
            .expect("decode");
        assert_eq!(outcome, MessageOutcome::NoGame);
        assert!(session.is_ready());
        assert_eq!(session.state().version(), 1);
    }

    #[test]
    fn malformed_message_is_reported_and_state_kept() {
        let mut session = session(Seat::Player(Role::Defender));
        session
            .receive_message(&game(json!({"tick": 4})))
            .expect("decode");
        let err = session.receive_message("{not json").expect_err("malformed");
        assert!(matches!(err, SessionError::Snapshot(_)));
        assert_eq!(session.state().snapshot().tick, Some(4));
    }

    #[test]
    fn primary_map_click_dispatches_trap_repair() {
        let mut session = session(Seat::Player(Role::Defender));
        session
            .receive_message(&game(json!({
                "tick": 12,
                "original_map": ["...", ".T.", "..."],
                "wave": {
                    "game_objects": {"trap": {"location": [1, 1], "charges": 0, "which": 0}},
                    "dropped_food": [{"uuid": "food-1", "location": [1, 1], "which": 0}]
                }
            })))
            .expect("decode");

        let outcome = session
            .handle_click(ClickEvent::primary(ClickSurface::Map, tile_center(1, 1)))
            .expect("click");
        match outcome {
            ClickOutcome::Dispatched { candidate, outcome } => {
                assert_eq!(candidate.label, "map_d_trap_0");
                assert_eq!(outcome, DispatchOutcome::Sent);
            }
            other => panic!("expected dispatch, got {other:?}"),
        }
        assert_eq!(
            sent_actions(&session),
            vec![("click_repair_trap".to_string(), vec![json!(0)])]
        );
        let marker = session.render_view().click_marker.expect("marker");
        assert_eq!(marker.color, MarkerColor::Red);
    }

    #[test]
    fn secondary_click_then_menu_pick_dispatches_chosen_candidate() {
        let mut session = session(Seat::Player(Role::Defender));
        session
            .receive_message(&game(json!({
                "tick": 12,
                "wave": {
                    "penance": {"d": [{"uuid": "runner-1", "location": [2, 2]}]},
                    "dropped_food": [{"uuid": "food-1", "location": [2, 2], "which": 1}]
                }
            })))
            .expect("decode");

        let anchor = tile_center(2, 2);
        let outcome = session
            .handle_click(ClickEvent::secondary(ClickSurface::Map, anchor))
            .expect("open");
        assert_eq!(outcome, ClickOutcome::MenuOpened { options: 4 });
        assert!(sent_actions(&session).is_empty());

        // Rows start 20px below the anchor; the second row is "walk".
        let pick = Vec2::new(anchor.x, anchor.y + 20.0 + 15.0 + 2.0);
        let outcome = session
            .handle_click(ClickEvent::primary(ClickSurface::Map, pick))
            .expect("pick");
        match outcome {
            ClickOutcome::MenuSelected { candidate, .. } => {
                assert_eq!(candidate.action, ActionName::ClickMove);
                assert_eq!(candidate.args, vec![ActionArg::Int(2), ActionArg::Int(2)]);
            }
            other => panic!("expected menu selection, got {other:?}"),
        }
        assert!(!session.menu().is_open());
        assert_eq!(
            sent_actions(&session),
            vec![("click_move".to_string(), vec![json!(2), json!(2)])]
        );
        assert_eq!(
            session.render_view().click_marker.map(|m| m.color),
            Some(MarkerColor::Yellow)
        );
    }

    #[test]
    fn primary_click_on_empty_slot_reports_no_candidate() {
        let mut session = session(Seat::Player(Role::Defender));
        session
            .receive_message(&game(json!({
                "tick": 1,
                "players": {"d": {"inventory": ["_", "0"]}}
            })))
            .expect("decode");
        let err = session
            .handle_click(ClickEvent::primary(
                ClickSurface::Inventory,
                Vec2::new(800.0 + 5.0, 5.0),
            ))
            .expect_err("empty slot");
        assert!(matches!(
            err,
            SessionError::Dispatch(DispatchError::NoCandidate)
        ));

        let outcome = session
            .handle_click(ClickEvent::primary(
                ClickSurface::Inventory,
                Vec2::new(800.0 + 50.0, 5.0),
            ))
            .expect("food slot");
        assert!(matches!(outcome, ClickOutcome::Dispatched { .. }));
        assert_eq!(
            sent_actions(&session),
            vec![("click_drop_select_food".to_string(), vec![json!([1])])]
        );
        assert!(session.render_view().click_marker.is_none());
    }

    #[test]
    fn unimplemented_inventory_branch_closes_open_menu() {
        let mut session = session(Seat::Player(Role::Collector));
        session
            .receive_message(&game(json!({
                "tick": 1,
                "players": {"c": {"inventory": ["E"]}}
            })))
            .expect("decode");
        session
            .handle_click(ClickEvent::secondary(ClickSurface::Map, tile_center(3, 3)))
            .expect("open");
        assert!(session.menu().is_open());

        let err = session
            .handle_click(ClickEvent::secondary(
                ClickSurface::Inventory,
                Vec2::new(805.0, 5.0),
            ))
            .expect_err("collector inventory");
        assert!(matches!(
            err,
            SessionError::Resolve(ResolveError::NotImplemented { .. })
        ));
        assert!(!session.menu().is_open());
    }

    #[test]
    fn pointer_motion_dismisses_menu_and_tracks_hover() {
        let mut session = session(Seat::Player(Role::Defender));
        session
            .receive_message(&game(json!({"tick": 1})))
            .expect("decode");
        let anchor = tile_center(10, 10);
        session
            .handle_click(ClickEvent::secondary(ClickSurface::Map, anchor))
            .expect("open");

        session.handle_pointer_motion(ClickSurface::Map, Vec2::new(anchor.x, anchor.y - 10.0));
        assert!(session.menu().is_open());
        session.handle_pointer_motion(ClickSurface::Map, Vec2::new(anchor.x, anchor.y - 31.0));
        assert!(!session.menu().is_open());

        let hover = session.render_view().hover.expect("hover");
        assert_eq!(hover.tile, TileCoord { col: 10, row: 8 });
        let candidate = hover.candidate.expect("walk");
        assert_eq!(candidate.label, "walk");
    }

    #[test]
    fn click_marker_expires_after_its_frames() {
        let mut session = session(Seat::Player(Role::Defender));
        session
            .receive_message(&game(json!({"tick": 1})))
            .expect("decode");
        session
            .handle_click(ClickEvent::primary(ClickSurface::Map, tile_center(0, 0)))
            .expect("walk");
        for _ in 0..CLICK_MARKER_FRAMES - 1 {
            session.advance_frame();
            assert!(session.render_view().click_marker.is_some());
        }
        session.advance_frame();
        assert!(session.render_view().click_marker.is_none());
    }

    #[test]
    fn spectator_clicks_resolve_but_are_suppressed() {
        let mut session = session(Seat::Spectator);
        session
            .receive_message(&game(json!({"tick": 1})))
            .expect("decode");
        let outcome = session
            .handle_click(ClickEvent::primary(ClickSurface::Map, tile_center(4, 4)))
            .expect("click");
        assert!(matches!(
            outcome,
            ClickOutcome::Dispatched {
                outcome: DispatchOutcome::Suppressed,
                ..
            }
        ));
        assert_eq!(session.room_connect().expect("connect"), DispatchOutcome::Sent);
        assert_eq!(sent_actions(&session).len(), 1);
    }

    #[test]
    fn status_view_reports_side_panel_values() {
        let mut session = session(Seat::Player(Role::Healer));
        session
            .receive_message(&game(json!({
                "tick": 30,
                "text": ["Wave started"],
                "players": {"h": {"received_call": 1, "correct_call": 2, "sent_call": 0}},
                "wave": {
                    "number": 0,
                    "relative_tick": 30,
                    "game_objects": {"trap": {"location": [1, 1], "charges": 2, "which": 0}}
                }
            })))
            .expect("decode");
        let status = session.render_view().status;
        assert_eq!(status.wave, Some(1));
        assert_eq!(status.relative_tick, Some(30));
        assert_eq!(status.trap_charges, Some(2));
        assert_eq!(status.received_call, Some(1));
        assert_eq!(status.correct_call, Some(2));
        assert_eq!(status.sent_call, Some(0));
        assert_eq!(status.required_call, None);
        assert_eq!(status.text, vec!["Wave started".to_string()]);
    }
}
