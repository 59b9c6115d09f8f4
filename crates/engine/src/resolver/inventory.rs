use crate::input::{MouseButton, SlotCoord};
use crate::snapshot::{Role, Seat, Snapshot};

use super::{ActionArg, ActionName, Candidate, ResolveError};

const EMPTY_SLOT: &str = "_";
const BLOCKED_SLOT: &str = "X";
const HORN: &str = "H";
const DEFENDER_CONSUMABLES: [&str; 3] = ["0", "1", "2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleFlow {
    Continue,
    Stop,
}

struct SlotContext<'a> {
    slot: usize,
    item: &'a str,
    button: MouseButton,
    seat: Seat,
    call_count: u32,
}

type InventoryRule = fn(&SlotContext<'_>, &mut Vec<Candidate>) -> Result<RuleFlow, ResolveError>;

const INVENTORY_RULES: [InventoryRule; 5] = [
    placeholder_rule,
    horn_rule,
    role_rule,
    destroy_rule,
    cancel_rule,
];

/// Candidates for a click on an inventory slot. Slots outside the grid or past the end of
/// the inventory behave like empty slots. A primary click on an empty slot yields no
/// candidates at all.
pub fn resolve_inventory_click(
    slot: SlotCoord,
    button: MouseButton,
    seat: Seat,
    snapshot: &Snapshot,
) -> Result<Vec<Candidate>, ResolveError> {
    let player = seat.role().and_then(|role| snapshot.player(role));
    let index = slot.index();
    let item = match (player, index) {
        (Some(player), Some(index)) => player
            .inventory
            .get(index)
            .map(String::as_str)
            .unwrap_or(EMPTY_SLOT),
        _ => EMPTY_SLOT,
    };
    let call_count = match seat.role() {
        Some(role) => player
            .and_then(|player| player.call_count)
            .unwrap_or_else(|| role.default_call_count()),
        None => 0,
    };
    let ctx = SlotContext {
        slot: index.unwrap_or_default(),
        item,
        button,
        seat,
        call_count,
    };

    let mut candidates = Vec::new();
    for rule in INVENTORY_RULES {
        if rule(&ctx, &mut candidates)? == RuleFlow::Stop {
            break;
        }
    }
    Ok(candidates)
}

fn placeholder_rule(
    ctx: &SlotContext<'_>,
    out: &mut Vec<Candidate>,
) -> Result<RuleFlow, ResolveError> {
    if ctx.item != EMPTY_SLOT && ctx.item != BLOCKED_SLOT {
        return Ok(RuleFlow::Continue);
    }
    if ctx.button == MouseButton::Secondary {
        out.push(Candidate::cancel());
    }
    Ok(RuleFlow::Stop)
}

fn horn_rule(ctx: &SlotContext<'_>, out: &mut Vec<Candidate>) -> Result<RuleFlow, ResolveError> {
    if ctx.item != HORN {
        return Ok(RuleFlow::Continue);
    }
    for option in 0..ctx.call_count {
        out.push(Candidate::new(
            format!("inventory_{}_h_{option}", ctx.seat),
            ActionName::ClickSelectCall,
            vec![ActionArg::Int(i64::from(option))],
        ));
        if ctx.button == MouseButton::Primary {
            return Ok(RuleFlow::Stop);
        }
    }
    Ok(RuleFlow::Continue)
}

fn role_rule(ctx: &SlotContext<'_>, out: &mut Vec<Candidate>) -> Result<RuleFlow, ResolveError> {
    match ctx.seat.role() {
        Some(Role::Defender) => {
            if DEFENDER_CONSUMABLES.contains(&ctx.item) {
                out.push(Candidate::new(
                    format!("inventory_d_{}", ctx.item),
                    ActionName::ClickDropSelectFood,
                    vec![slot_list(ctx.slot)],
                ));
            }
            Ok(RuleFlow::Continue)
        }
        Some(Role::Healer) => {
            out.push(Candidate::new(
                format!("inventory_h_{}", ctx.item),
                ActionName::ClickIdle,
                Vec::new(),
            ));
            Ok(RuleFlow::Continue)
        }
        Some(Role::Attacker | Role::SecondAttacker | Role::Collector) | None => {
            Err(ResolveError::NotImplemented {
                seat: ctx.seat,
                item: ctx.item.to_string(),
            })
        }
    }
}

fn destroy_rule(ctx: &SlotContext<'_>, out: &mut Vec<Candidate>) -> Result<RuleFlow, ResolveError> {
    out.push(Candidate::new(
        format!("inventory_{}_{}_b", ctx.seat, ctx.item.to_lowercase()),
        ActionName::ClickDestroyItems,
        vec![slot_list(ctx.slot)],
    ));
    Ok(RuleFlow::Continue)
}

fn cancel_rule(_: &SlotContext<'_>, out: &mut Vec<Candidate>) -> Result<RuleFlow, ResolveError> {
    out.push(Candidate::cancel());
    Ok(RuleFlow::Stop)
}

fn slot_list(slot: usize) -> ActionArg {
    ActionArg::IntList(vec![slot as i64])
}
