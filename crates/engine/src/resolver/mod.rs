mod inventory;
mod map;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::input::{MouseButton, SlotCoord, TileCoord};
use crate::snapshot::{Seat, Snapshot};
use crate::spatial_index::SpatialIndex;

pub use inventory::resolve_inventory_click;
pub use map::resolve_map_click;

pub const CANCEL_LABEL: &str = "cancel";
pub const WALK_LABEL: &str = "walk";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("seat '{seat}' has no inventory action for item '{item}' yet")]
    NotImplemented { seat: Seat, item: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    ClickIdle,
    ClickMove,
    ClickAttack,
    ClickUsePoisonFood,
    ClickUseDispenser,
    ClickRepairTrap,
    ClickPickItem,
    ClickSelectCall,
    ClickDropSelectFood,
    ClickDestroyItems,
}

impl ActionName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClickIdle => "click_idle",
            Self::ClickMove => "click_move",
            Self::ClickAttack => "click_attack",
            Self::ClickUsePoisonFood => "click_use_poison_food",
            Self::ClickUseDispenser => "click_use_dispenser",
            Self::ClickRepairTrap => "click_repair_trap",
            Self::ClickPickItem => "click_pick_item",
            Self::ClickSelectCall => "click_select_call",
            Self::ClickDropSelectFood => "click_drop_select_food",
            Self::ClickDestroyItems => "click_destroy_items",
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ActionArg {
    Int(i64),
    Text(String),
    IntList(Vec<i64>),
}

impl From<i64> for ActionArg {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ActionArg {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub label: String,
    pub action: ActionName,
    pub args: Vec<ActionArg>,
}

impl Candidate {
    pub fn new(label: impl Into<String>, action: ActionName, args: Vec<ActionArg>) -> Self {
        Self {
            label: label.into(),
            action,
            args,
        }
    }

    pub fn cancel() -> Self {
        Self::new(CANCEL_LABEL, ActionName::ClickIdle, Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    Primary,
    Deferred,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateBuffers {
    primary: Vec<Candidate>,
    deferred: Vec<Candidate>,
}

impl CandidateBuffers {
    pub fn push(&mut self, target: BufferTarget, candidate: Candidate) {
        match target {
            BufferTarget::Primary => self.primary.push(candidate),
            BufferTarget::Deferred => self.deferred.push(candidate),
        }
    }

    pub fn primary(&self) -> &[Candidate] {
        &self.primary
    }

    pub fn deferred(&self) -> &[Candidate] {
        &self.deferred
    }

    pub fn into_menu(self) -> Vec<Candidate> {
        let mut menu = self.primary;
        menu.extend(self.deferred);
        menu.push(Candidate::cancel());
        menu
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    Map(TileCoord),
    Inventory(SlotCoord),
}

pub fn resolve_click(
    target: ClickTarget,
    button: MouseButton,
    seat: Seat,
    snapshot: &Snapshot,
    index: &SpatialIndex,
) -> Result<Vec<Candidate>, ResolveError> {
    match target {
        ClickTarget::Map(tile) => {
            let buffers = resolve_map_click(tile, button, seat, snapshot, index);
            Ok(match button {
                MouseButton::Primary => buffers.primary,
                MouseButton::Secondary => buffers.into_menu(),
            })
        }
        ClickTarget::Inventory(slot) => resolve_inventory_click(slot, button, seat, snapshot),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::Value;

    use crate::snapshot::Snapshot;
    use crate::spatial_index::SpatialIndex;

    pub fn fixture(value: Value) -> (Snapshot, SpatialIndex) {
        let snapshot: Snapshot = serde_json::from_value(value).expect("snapshot fixture");
        let index = SpatialIndex::rebuild(&snapshot);
        (snapshot, index)
    }

    pub fn labels(candidates: &[super::Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.label.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_args_serialize_as_bare_values() {
        let args = vec![
            ActionArg::Int(3),
            ActionArg::from("uuid-1"),
            ActionArg::IntList(vec![5]),
        ];
        let encoded = serde_json::to_string(&args).expect("encode");
        assert_eq!(encoded, r#"[3,"uuid-1",[5]]"#);
        assert_eq!(
            serde_json::to_string(&ActionName::ClickUsePoisonFood).expect("encode"),
            r#""click_use_poison_food""#
        );
    }

    #[test]
    fn menu_order_is_primary_then_deferred_then_cancel() {
        let mut buffers = CandidateBuffers::default();
        buffers.push(
            BufferTarget::Deferred,
            Candidate::new("map_d_runner", ActionName::ClickIdle, Vec::new()),
        );
        buffers.push(
            BufferTarget::Primary,
            Candidate::new(WALK_LABEL, ActionName::ClickMove, vec![ActionArg::Int(1), ActionArg::Int(2)]),
        );
        let menu = buffers.into_menu();
        assert_eq!(
            test_support::labels(&menu),
            vec!["walk", "map_d_runner", "cancel"]
        );
    }
}
