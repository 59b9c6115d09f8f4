pub const TILE_SIZE_PX: f32 = 20.0;
pub const MAP_WIDTH_TILES: i32 = 39;
pub const MAP_HEIGHT_TILES: i32 = 37;
pub const INVENTORY_COLS: i32 = 4;
pub const INVENTORY_ROWS: i32 = 7;
pub const INVENTORY_SLOT_WIDTH_PX: f32 = 42.0;
pub const INVENTORY_SLOT_HEIGHT_PX: f32 = 36.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset_from(self, origin: Vec2) -> Vec2 {
        Vec2 {
            x: self.x - origin.x,
            y: self.y - origin.y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickSurface {
    Map,
    Inventory,
    Chrome,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickEvent {
    pub surface: ClickSurface,
    pub button: MouseButton,
    pub position_px: Vec2,
}

impl ClickEvent {
    pub fn primary(surface: ClickSurface, position_px: Vec2) -> Self {
        Self {
            surface,
            button: MouseButton::Primary,
            position_px,
        }
    }

    pub fn secondary(surface: ClickSurface, position_px: Vec2) -> Self {
        Self {
            surface,
            button: MouseButton::Secondary,
            position_px,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub col: i32,
    pub row: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotCoord {
    pub col: i32,
    pub row: i32,
}

impl SlotCoord {
    pub fn index(self) -> Option<usize> {
        if self.col < 0 || self.row < 0 || self.col >= INVENTORY_COLS || self.row >= INVENTORY_ROWS
        {
            return None;
        }
        Some((self.row * INVENTORY_COLS + self.col) as usize)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SurfaceLayout {
    pub map_origin_px: Vec2,
    pub inventory_origin_px: Vec2,
}

impl SurfaceLayout {
    pub fn map_tile_at(&self, screen_px: Vec2) -> TileCoord {
        pixel_to_tile(screen_px.offset_from(self.map_origin_px))
    }

    pub fn inventory_slot_at(&self, screen_px: Vec2) -> SlotCoord {
        pixel_to_slot(screen_px.offset_from(self.inventory_origin_px))
    }

    pub fn surface_at(&self, screen_px: Vec2) -> ClickSurface {
        let map = screen_px.offset_from(self.map_origin_px);
        let map_size = Vec2::new(
            MAP_WIDTH_TILES as f32 * TILE_SIZE_PX,
            MAP_HEIGHT_TILES as f32 * TILE_SIZE_PX,
        );
        if within(map, map_size) {
            return ClickSurface::Map;
        }
        let inventory = screen_px.offset_from(self.inventory_origin_px);
        let inventory_size = Vec2::new(
            INVENTORY_COLS as f32 * INVENTORY_SLOT_WIDTH_PX,
            INVENTORY_ROWS as f32 * INVENTORY_SLOT_HEIGHT_PX,
        );
        if within(inventory, inventory_size) {
            return ClickSurface::Inventory;
        }
        ClickSurface::Chrome
    }
}

fn within(local_px: Vec2, size: Vec2) -> bool {
    local_px.x >= 0.0 && local_px.y >= 0.0 && local_px.x < size.x && local_px.y < size.y
}

/// Negative coordinates are kept as-is; they resolve to cells that hold nothing.
pub fn pixel_to_tile(local_px: Vec2) -> TileCoord {
    TileCoord {
        col: floor_div(local_px.x, TILE_SIZE_PX),
        row: floor_div(local_px.y, TILE_SIZE_PX),
    }
}

pub fn pixel_to_slot(local_px: Vec2) -> SlotCoord {
    SlotCoord {
        col: floor_div(local_px.x, INVENTORY_SLOT_WIDTH_PX),
        row: floor_div(local_px.y, INVENTORY_SLOT_HEIGHT_PX),
    }
}

fn floor_div(value: f32, cell: f32) -> i32 {
    (value / cell).floor() as i32
}
