use tracing::warn;

use crate::input::{TileCoord, MAP_HEIGHT_TILES, MAP_WIDTH_TILES};
use crate::snapshot::{ItemKind, Location, Snapshot, Species};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileCategory {
    Penance(Species),
    Item(ItemKind),
}

impl TileCategory {
    pub const ALL: [TileCategory; 7] = [
        TileCategory::Penance(Species::Runner),
        TileCategory::Penance(Species::Healer),
        TileCategory::Penance(Species::Fighter),
        TileCategory::Penance(Species::Ranger),
        TileCategory::Item(ItemKind::Eggs),
        TileCategory::Item(ItemKind::Food),
        TileCategory::Item(ItemKind::HammerLogs),
    ];

    fn slot(self) -> usize {
        match self {
            Self::Penance(Species::Runner) => 0,
            Self::Penance(Species::Healer) => 1,
            Self::Penance(Species::Fighter) => 2,
            Self::Penance(Species::Ranger) => 3,
            Self::Item(ItemKind::Eggs) => 4,
            Self::Item(ItemKind::Food) => 5,
            Self::Item(ItemKind::HammerLogs) => 6,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Penance(species) => species.key(),
            Self::Item(kind) => kind.key(),
        }
    }
}

// Far above any real map; larger terrain falls back to the fixed map size.
const MAX_GRID_CELLS: usize = 1 << 16;

#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    cols: i32,
    rows: i32,
    cells: Vec<Vec<Vec<usize>>>,
}

impl SpatialIndex {
    pub fn rebuild(snapshot: &Snapshot) -> Self {
        let (cols, rows, cell_count) = match grid_cells(snapshot.grid_size()) {
            Some(grid) => grid,
            None => {
                let (cols, rows) = snapshot.grid_size();
                warn!(cols, rows, "terrain_too_large");
                let fallback = (MAP_WIDTH_TILES, MAP_HEIGHT_TILES);
                grid_cells(fallback).unwrap_or((0, 0, 0))
            }
        };
        let mut index = Self {
            cols,
            rows,
            cells: vec![vec![Vec::new(); cell_count]; TileCategory::ALL.len()],
        };

        for species in Species::RESOLUTION_ORDER {
            let category = TileCategory::Penance(species);
            for (entity, penance) in snapshot.penance(species).iter().enumerate() {
                index.insert(category, penance.location, entity, &penance.uuid);
            }
        }
        for kind in ItemKind::RESOLUTION_ORDER {
            let category = TileCategory::Item(kind);
            for (entity, item) in snapshot.dropped(kind).iter().enumerate() {
                index.insert(category, item.location, entity, &item.uuid);
            }
        }
        index
    }

    pub fn at(&self, category: TileCategory, tile: TileCoord) -> &[usize] {
        match self.cell_offset(tile.col, tile.row) {
            Some(offset) => &self.cells[category.slot()][offset],
            None => &[],
        }
    }

    pub fn dimensions(&self) -> (i32, i32) {
        (self.cols, self.rows)
    }

    fn insert(&mut self, category: TileCategory, location: Location, entity: usize, uuid: &str) {
        match self.cell_offset(location.col, location.row) {
            Some(offset) => self.cells[category.slot()][offset].push(entity),
            None => warn!(
                category = category.key(),
                uuid,
                col = location.col,
                row = location.row,
                "entity_outside_grid"
            ),
        }
    }

    fn cell_offset(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || row < 0 || col >= self.cols || row >= self.rows {
            return None;
        }
        Some(row as usize * self.cols as usize + col as usize)
    }
}

fn grid_cells((cols, rows): (i32, i32)) -> Option<(i32, i32, usize)> {
    let cols = cols.max(0);
    let rows = rows.max(0);
    let cell_count = (cols as usize).checked_mul(rows as usize)?;
    (cell_count <= MAX_GRID_CELLS).then_some((cols, rows, cell_count))
}
