use crate::input::{MouseButton, TileCoord};
use crate::snapshot::{ItemKind, Role, Seat, Snapshot, Species, TRAP_MAX_CHARGES};
use crate::spatial_index::{SpatialIndex, TileCategory};

use super::{ActionArg, ActionName, BufferTarget, Candidate, CandidateBuffers, WALK_LABEL};

const HEALER_DISPENSER_OPTIONS: [&str; 6] = ["5", "6", "0", "1", "x", "2"];
const HEALER_DISPENSER_VISIBLE: usize = 4;

const HAMMER_ITEM_NUMBER: i64 = 3;
const LOGS_ITEM_NUMBER: i64 = 4;

struct MapContext<'a> {
    tile: TileCoord,
    seat: Seat,
    snapshot: &'a Snapshot,
    index: &'a SpatialIndex,
    symbol: Option<char>,
}

impl MapContext<'_> {
    fn role(&self) -> Option<Role> {
        self.seat.role()
    }

    fn is_role(&self, role: Role) -> bool {
        self.role() == Some(role)
    }

    fn occupants(&self, category: TileCategory) -> &[usize] {
        self.index.at(category, self.tile)
    }
}

struct MapRule {
    applies: fn(&MapContext<'_>) -> bool,
    produce: fn(&MapContext<'_>) -> Vec<Candidate>,
    target: BufferTarget,
}

struct MapStage {
    name: &'static str,
    rules: &'static [MapRule],
}

const HOSTILE_STAGE: MapStage = MapStage {
    name: "hostile",
    rules: &[
        MapRule {
            applies: |ctx| !ctx.occupants(TileCategory::Penance(Species::Runner)).is_empty(),
            produce: runner_candidates,
            target: BufferTarget::Deferred,
        },
        MapRule {
            applies: |ctx| !ctx.occupants(TileCategory::Penance(Species::Healer)).is_empty(),
            produce: healer_candidates,
            target: BufferTarget::Deferred,
        },
        MapRule {
            applies: |ctx| !ctx.occupants(TileCategory::Penance(Species::Fighter)).is_empty(),
            produce: fighter_candidates,
            target: BufferTarget::Deferred,
        },
        MapRule {
            applies: |ctx| !ctx.occupants(TileCategory::Penance(Species::Ranger)).is_empty(),
            produce: ranger_candidates,
            target: BufferTarget::Deferred,
        },
    ],
};

const OBJECT_STAGE: MapStage = MapStage {
    name: "object",
    rules: &[
        MapRule {
            applies: |ctx| on_own_dispenser(ctx) && !ctx.is_role(Role::Healer),
            produce: role_dispenser_candidates,
            target: BufferTarget::Primary,
        },
        MapRule {
            applies: |ctx| on_own_dispenser(ctx) && ctx.is_role(Role::Healer),
            produce: |_| healer_dispenser_candidates(&HEALER_DISPENSER_OPTIONS[..HEALER_DISPENSER_VISIBLE]),
            target: BufferTarget::Primary,
        },
        MapRule {
            applies: |ctx| on_own_dispenser(ctx) && ctx.is_role(Role::Healer),
            produce: |_| healer_dispenser_candidates(&HEALER_DISPENSER_OPTIONS[HEALER_DISPENSER_VISIBLE..]),
            target: BufferTarget::Deferred,
        },
        MapRule {
            applies: |ctx| ctx.is_role(Role::Defender),
            produce: trap_repair_candidates,
            target: BufferTarget::Primary,
        },
    ],
};

const ITEM_STAGE: MapStage = MapStage {
    name: "item",
    rules: &[
        MapRule {
            applies: |ctx| ctx.is_role(Role::Collector),
            produce: |ctx| pickup_candidates(ctx, ItemKind::Eggs),
            target: BufferTarget::Primary,
        },
        MapRule {
            applies: |ctx| ctx.is_role(Role::Defender),
            produce: |ctx| pickup_candidates(ctx, ItemKind::Food),
            target: BufferTarget::Primary,
        },
        MapRule {
            applies: |ctx| ctx.is_role(Role::Defender),
            produce: |ctx| pickup_candidates(ctx, ItemKind::HammerLogs),
            target: BufferTarget::Primary,
        },
    ],
};

const MOVE_STAGE: MapStage = MapStage {
    name: "move",
    rules: &[MapRule {
        applies: |_| true,
        produce: |ctx| {
            vec![Candidate::new(
                WALK_LABEL,
                ActionName::ClickMove,
                vec![
                    ActionArg::Int(i64::from(ctx.tile.col)),
                    ActionArg::Int(i64::from(ctx.tile.row)),
                ],
            )]
        },
        target: BufferTarget::Primary,
    }],
};

const MAP_STAGES: [MapStage; 4] = [HOSTILE_STAGE, OBJECT_STAGE, ITEM_STAGE, MOVE_STAGE];

/// Runs the map stages in order. A primary click stops after the first stage that leaves
/// the primary buffer non-empty; hostile options only ever land in the deferred buffer,
/// so a primary click never acts on a hostile.
pub fn resolve_map_click(
    tile: TileCoord,
    button: MouseButton,
    seat: Seat,
    snapshot: &Snapshot,
    index: &SpatialIndex,
) -> CandidateBuffers {
    let ctx = MapContext {
        tile,
        seat,
        snapshot,
        index,
        symbol: snapshot.terrain_at(tile),
    };
    let mut buffers = CandidateBuffers::default();

    for stage in &MAP_STAGES {
        for rule in stage.rules {
            if (rule.applies)(&ctx) {
                for candidate in (rule.produce)(&ctx) {
                    buffers.push(rule.target, candidate);
                }
            }
        }
        if button == MouseButton::Primary && !buffers.primary().is_empty() {
            tracing::trace!(stage = stage.name, "map_click_resolved");
            break;
        }
    }
    buffers
}

fn on_own_dispenser(ctx: &MapContext<'_>) -> bool {
    match (ctx.role().and_then(Role::dispenser_symbol), ctx.symbol) {
        (Some(dispenser), Some(symbol)) => dispenser == symbol,
        _ => false,
    }
}

fn runner_candidates(ctx: &MapContext<'_>) -> Vec<Candidate> {
    ctx.occupants(TileCategory::Penance(Species::Runner))
        .iter()
        .map(|_| Candidate::new("map_d_runner", ActionName::ClickIdle, Vec::new()))
        .collect()
}

fn healer_candidates(ctx: &MapContext<'_>) -> Vec<Candidate> {
    let healers = ctx.snapshot.penance(Species::Healer);
    let correct_call = ctx
        .snapshot
        .player(Role::Healer)
        .and_then(|player| player.correct_call);
    ctx.occupants(TileCategory::Penance(Species::Healer))
        .iter()
        .filter_map(|&entity| healers.get(entity))
        .map(|healer| match (ctx.is_role(Role::Healer), correct_call) {
            (true, Some(call)) => Candidate::new(
                format!("map_h_use_{call}"),
                ActionName::ClickUsePoisonFood,
                vec![ActionArg::Int(call), ActionArg::Text(healer.uuid.clone())],
            ),
            _ => Candidate::new("map_h_healer", ActionName::ClickIdle, Vec::new()),
        })
        .collect()
}

fn fighter_candidates(ctx: &MapContext<'_>) -> Vec<Candidate> {
    attackable_candidates(ctx, Species::Fighter, "map_a_fighter")
}

fn ranger_candidates(ctx: &MapContext<'_>) -> Vec<Candidate> {
    attackable_candidates(ctx, Species::Ranger, "map_a_ranger")
}

fn attackable_candidates(ctx: &MapContext<'_>, species: Species, label: &str) -> Vec<Candidate> {
    let is_attacker = ctx.role().is_some_and(Role::is_attacker);
    let entities = ctx.snapshot.penance(species);
    ctx.occupants(TileCategory::Penance(species))
        .iter()
        .filter_map(|&entity| entities.get(entity))
        .map(|penance| {
            if is_attacker {
                Candidate::new(
                    label,
                    ActionName::ClickAttack,
                    vec![ActionArg::Text(penance.uuid.clone())],
                )
            } else {
                Candidate::new(format!("{label}_x"), ActionName::ClickIdle, Vec::new())
            }
        })
        .collect()
}

fn role_dispenser_candidates(ctx: &MapContext<'_>) -> Vec<Candidate> {
    ctx.role()
        .map(|role| {
            Candidate::new(
                format!("map_{role}_disp_5"),
                ActionName::ClickUseDispenser,
                Vec::new(),
            )
        })
        .into_iter()
        .collect()
}

fn healer_dispenser_candidates(options: &[&str]) -> Vec<Candidate> {
    options
        .iter()
        .map(|option| {
            let label = format!("map_h_disp_{option}");
            match option.parse::<i64>() {
                Ok(number) => Candidate::new(
                    label,
                    ActionName::ClickUseDispenser,
                    vec![ActionArg::Int(number)],
                ),
                Err(_) => Candidate::new(label, ActionName::ClickIdle, Vec::new()),
            }
        })
        .collect()
}

fn trap_repair_candidates(ctx: &MapContext<'_>) -> Vec<Candidate> {
    let Some(trap) = ctx.symbol.and_then(|symbol| ctx.snapshot.trap_for_symbol(symbol)) else {
        return Vec::new();
    };
    match (trap.charges, trap.which) {
        (Some(charges), Some(which)) if charges < TRAP_MAX_CHARGES => vec![Candidate::new(
            format!("map_d_trap_{charges}"),
            ActionName::ClickRepairTrap,
            vec![ActionArg::Int(which)],
        )],
        _ => Vec::new(),
    }
}

fn pickup_candidates(ctx: &MapContext<'_>, kind: ItemKind) -> Vec<Candidate> {
    let items = ctx.snapshot.dropped(kind);
    ctx.occupants(TileCategory::Item(kind))
        .iter()
        .filter_map(|&entity| items.get(entity))
        .map(|item| {
            let label = match kind {
                ItemKind::Eggs => format!("map_c_item_{}", item.which.unwrap_or_default()),
                ItemKind::Food => format!("map_d_item_{}", item.which.unwrap_or_default()),
                ItemKind::HammerLogs if item.is_hammer() => {
                    format!("map_d_item_{HAMMER_ITEM_NUMBER}")
                }
                ItemKind::HammerLogs => format!("map_d_item_{LOGS_ITEM_NUMBER}"),
            };
            Candidate::new(
                label,
                ActionName::ClickPickItem,
                vec![ActionArg::Text(item.uuid.clone())],
            )
        })
        .collect()
}
