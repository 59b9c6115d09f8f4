use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use crate::input::Vec2;
use crate::resolver::Candidate;

pub const MENU_PADDING_PX: f32 = 4.0;
pub const MENU_ROW_HEIGHT_PX: f32 = 15.0;
pub const MENU_DISMISS_TOLERANCE_PX: f32 = 30.0;

const DEFAULT_HEADER: LabelMetrics = LabelMetrics::new(104.0, 19.0);
const DEFAULT_FOOTER: LabelMetrics = LabelMetrics::new(104.0, 4.0);
const DEFAULT_RIGHT_BORDER_WIDTH_PX: f32 = 3.0;

const DEFAULT_LABEL_WIDTHS: &[(&str, f32)] = &[
    ("cancel", 44.0),
    ("walk", 50.0),
    ("map_d_disp_5", 128.0),
    ("map_a_disp_5", 128.0),
    ("map_c_disp_5", 128.0),
    ("map_h_disp_5", 140.0),
    ("map_h_disp_6", 140.0),
    ("map_h_disp_0", 152.0),
    ("map_h_disp_1", 150.0),
    ("map_h_disp_x", 146.0),
    ("map_h_disp_2", 150.0),
    ("map_d_item_0", 104.0),
    ("map_d_item_1", 110.0),
    ("map_d_item_2", 108.0),
    ("map_d_item_3", 84.0),
    ("map_d_item_4", 76.0),
    ("map_c_item_0", 96.0),
    ("map_c_item_1", 100.0),
    ("map_c_item_2", 96.0),
    ("map_c_load", 118.0),
    ("map_cannon", 112.0),
    ("map_a_fighter", 128.0),
    ("map_a_ranger", 126.0),
    ("map_h_healer", 98.0),
    ("map_d_runner", 98.0),
    ("map_d_trap_0", 90.0),
    ("map_d_trap_1", 90.0),
    ("inventory_d_0", 110.0),
    ("inventory_d_1", 114.0),
    ("inventory_d_2", 112.0),
    ("inventory_d_0_b", 116.0),
    ("inventory_d_1_b", 120.0),
    ("inventory_d_2_b", 118.0),
    ("inventory_d_h_0", 106.0),
    ("inventory_d_h_1", 108.0),
    ("inventory_d_h_2", 104.0),
    ("inventory_d_h_b", 120.0),
];

#[derive(Debug, Error)]
pub enum MenuMetricsError {
    #[error("parse menu metrics at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("menu metric {field} must be {expected}, got {value}")]
    Invalid {
        field: String,
        value: f32,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LabelMetrics {
    pub width: f32,
    pub height: f32,
}

impl LabelMetrics {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MenuMetrics {
    pub header: LabelMetrics,
    pub footer: LabelMetrics,
    pub right_border_width: f32,
    #[serde(default = "default_padding")]
    pub padding: f32,
    #[serde(default = "default_row_height")]
    pub row_height: f32,
    #[serde(default)]
    pub labels: HashMap<String, LabelMetrics>,
}

fn default_padding() -> f32 {
    MENU_PADDING_PX
}

fn default_row_height() -> f32 {
    MENU_ROW_HEIGHT_PX
}

impl Default for MenuMetrics {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER,
            footer: DEFAULT_FOOTER,
            right_border_width: DEFAULT_RIGHT_BORDER_WIDTH_PX,
            padding: MENU_PADDING_PX,
            row_height: MENU_ROW_HEIGHT_PX,
            labels: DEFAULT_LABEL_WIDTHS
                .iter()
                .map(|&(key, width)| {
                    (
                        key.to_string(),
                        LabelMetrics::new(width, MENU_ROW_HEIGHT_PX),
                    )
                })
                .collect(),
        }
    }
}

impl MenuMetrics {
    pub fn from_json(raw: &str) -> Result<Self, MenuMetricsError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let metrics = serde_path_to_error::deserialize::<_, Self>(&mut deserializer).map_err(
            |error| {
                let path = error.path().to_string();
                MenuMetricsError::Parse {
                    path,
                    source: error.into_inner(),
                }
            },
        )?;
        metrics.validate()?;
        Ok(metrics)
    }

    fn validate(&self) -> Result<(), MenuMetricsError> {
        if !(self.row_height.is_finite() && self.row_height > 0.0) {
            return Err(MenuMetricsError::Invalid {
                field: "row_height".to_string(),
                value: self.row_height,
                expected: "a positive number",
            });
        }
        let sizes = [
            ("header.width", self.header.width),
            ("header.height", self.header.height),
            ("footer.width", self.footer.width),
            ("footer.height", self.footer.height),
            ("right_border_width", self.right_border_width),
            ("padding", self.padding),
        ];
        let labels = self.labels.iter().flat_map(|(key, label)| {
            [
                (format!("labels.{key}.width"), label.width),
                (format!("labels.{key}.height"), label.height),
            ]
        });
        for (field, value) in sizes
            .into_iter()
            .map(|(field, value)| (field.to_string(), value))
            .chain(labels)
        {
            if !(value.is_finite() && value >= 0.0) {
                return Err(MenuMetricsError::Invalid {
                    field,
                    value,
                    expected: "a finite, non-negative number",
                });
            }
        }
        Ok(())
    }

    pub fn label(&self, key: &str) -> Option<LabelMetrics> {
        self.labels.get(key).copied()
    }

    pub fn menu_size(&self, candidates: &[Candidate]) -> (f32, f32) {
        let mut width = self.header.width + self.padding;
        let mut height = self.header.height;
        for metrics in candidates.iter().filter_map(|c| self.label(&c.label)) {
            width = width.max(metrics.width + self.padding);
            height += metrics.height;
        }
        (width + self.right_border_width, height + self.footer.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuRect {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl MenuRect {
    pub fn anchored(anchor: Vec2, width: f32, height: f32) -> Self {
        Self {
            x_min: anchor.x - width / 2.0,
            y_min: anchor.y,
            x_max: anchor.x + width / 2.0,
            y_max: anchor.y + height,
        }
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x_min
            && point.x <= self.x_max
            && point.y >= self.y_min
            && point.y <= self.y_max
    }
}

pub fn should_dismiss(rect: &MenuRect, pointer: Vec2, tolerance: f32) -> bool {
    rect.x_min - pointer.x > tolerance
        || rect.y_min - pointer.y > tolerance
        || pointer.x - rect.x_max > tolerance
        || pointer.y - rect.y_max > tolerance
}

pub fn hit_index(rect: &MenuRect, header_height: f32, row_height: f32, y: f32) -> Option<usize> {
    let row = ((y - rect.y_min - header_height) / row_height).floor();
    if !row.is_finite() || row < 0.0 {
        return None;
    }
    Some(row as usize)
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuClick {
    Outside,
    Selected(Candidate),
    Absorbed,
}

#[derive(Debug, Clone, PartialEq)]
struct OpenMenu {
    candidates: Vec<Candidate>,
    rect: MenuRect,
    header_height: f32,
    row_height: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextMenu {
    open: Option<OpenMenu>,
}

impl ContextMenu {
    pub fn open(&mut self, anchor: Vec2, candidates: Vec<Candidate>, metrics: &MenuMetrics) {
        let (width, height) = metrics.menu_size(&candidates);
        self.open = Some(OpenMenu {
            candidates,
            rect: MenuRect::anchored(anchor, width, height),
            header_height: metrics.header.height,
            row_height: metrics.row_height,
        });
    }

    pub fn close(&mut self) {
        self.open = None;
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn rect(&self) -> Option<MenuRect> {
        self.open.as_ref().map(|menu| menu.rect)
    }

    pub fn candidates(&self) -> &[Candidate] {
        self.open
            .as_ref()
            .map(|menu| menu.candidates.as_slice())
            .unwrap_or(&[])
    }

    pub fn click(&mut self, point: Vec2) -> MenuClick {
        let Some(menu) = self.open.take() else {
            return MenuClick::Outside;
        };
        if !menu.rect.contains(point) {
            return MenuClick::Outside;
        }
        hit_index(&menu.rect, menu.header_height, menu.row_height, point.y)
            .and_then(|row| menu.candidates.into_iter().nth(row))
            .map_or(MenuClick::Absorbed, MenuClick::Selected)
    }

    pub fn pointer_moved(&mut self, pointer: Vec2) -> bool {
        let dismiss = self
            .open
            .as_ref()
            .is_some_and(|menu| should_dismiss(&menu.rect, pointer, MENU_DISMISS_TOLERANCE_PX));
        if dismiss {
            self.open = None;
        }
        dismiss
    }

    pub fn view(&self, metrics: &MenuMetrics) -> Option<MenuView> {
        let menu = self.open.as_ref()?;
        let mut top = menu.rect.y_min + menu.header_height;
        let mut rows = Vec::new();
        for (index, candidate) in menu.candidates.iter().enumerate() {
            let Some(label) = metrics.label(&candidate.label) else {
                continue;
            };
            rows.push(MenuRowView {
                index,
                label: candidate.label.clone(),
                left_px: menu.rect.x_min,
                top_px: top,
                width_px: label.width,
                height_px: label.height,
            });
            top += label.height;
        }
        Some(MenuView {
            rect: menu.rect,
            rows,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuView {
    pub rect: MenuRect,
    pub rows: Vec<MenuRowView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuRowView {
    /// Position in the candidate list, which is what a click selects.
    pub index: usize,
    pub label: String,
    pub left_px: f32,
    pub top_px: f32,
    pub width_px: f32,
    pub height_px: f32,
}
