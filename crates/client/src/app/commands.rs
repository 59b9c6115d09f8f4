use assault_engine::{ClickSurface, MouseButton, RoomMode, Vec2};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum CommandParseError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InputCommand {
    Click {
        surface: ClickSurface,
        button: MouseButton,
        position_px: Vec2,
    },
    Move { position_px: Vec2 },
    Wave { number: i64, runner_movements: String },
    Mode(RoomMode),
    Step,
    Quit,
}

const CLICK_USAGE: &str = "click <map|inventory|menu> <primary|secondary> <x> <y>";
const MOVE_USAGE: &str = "move <x> <y>";
const WAVE_USAGE: &str = "wave <n> [movements]";
const MODE_USAGE: &str = "mode <delay|pause|fast>";

pub(crate) fn parse_input_line(line: &str) -> Result<Option<InputCommand>, CommandParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let words = trimmed.split_whitespace().collect::<Vec<_>>();
    let command = match words.as_slice() {
        ["click", surface, button, x, y] => InputCommand::Click {
            surface: parse_surface(surface)?,
            button: parse_button(button)?,
            position_px: Vec2::new(parse_px(x)?, parse_px(y)?),
        },
        ["click", ..] => return Err(CommandParseError::Usage(CLICK_USAGE)),
        ["move", x, y] => InputCommand::Move {
            position_px: Vec2::new(parse_px(x)?, parse_px(y)?),
        },
        ["move", ..] => return Err(CommandParseError::Usage(MOVE_USAGE)),
        ["wave", number] => InputCommand::Wave {
            number: parse_int(number)?,
            runner_movements: String::new(),
        },
        ["wave", number, movements] => InputCommand::Wave {
            number: parse_int(number)?,
            runner_movements: (*movements).to_string(),
        },
        ["wave", ..] => return Err(CommandParseError::Usage(WAVE_USAGE)),
        ["mode", mode] => InputCommand::Mode(
            RoomMode::parse(mode).ok_or(CommandParseError::Usage(MODE_USAGE))?,
        ),
        ["mode", ..] => return Err(CommandParseError::Usage(MODE_USAGE)),
        ["step"] => InputCommand::Step,
        ["quit"] | ["exit"] => InputCommand::Quit,
        [other, ..] => return Err(CommandParseError::Unknown((*other).to_string())),
        [] => return Ok(None),
    };
    Ok(Some(command))
}

fn parse_surface(raw: &str) -> Result<ClickSurface, CommandParseError> {
    match raw {
        "map" => Ok(ClickSurface::Map),
        "inventory" | "inv" => Ok(ClickSurface::Inventory),
        "menu" | "chrome" => Ok(ClickSurface::Chrome),
        _ => Err(CommandParseError::Usage(CLICK_USAGE)),
    }
}

fn parse_button(raw: &str) -> Result<MouseButton, CommandParseError> {
    match raw {
        "primary" | "left" => Ok(MouseButton::Primary),
        "secondary" | "right" => Ok(MouseButton::Secondary),
        _ => Err(CommandParseError::Usage(CLICK_USAGE)),
    }
}

fn parse_px(raw: &str) -> Result<f32, CommandParseError> {
    raw.parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| CommandParseError::InvalidNumber(raw.to_string()))
}

fn parse_int(raw: &str) -> Result<i64, CommandParseError> {
    raw.parse::<i64>()
        .map_err(|_| CommandParseError::InvalidNumber(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_lines_parse_surface_button_and_position() {
        assert_eq!(
            parse_input_line("click map secondary 45 61.5"),
            Ok(Some(InputCommand::Click {
                surface: ClickSurface::Map,
                button: MouseButton::Secondary,
                position_px: Vec2::new(45.0, 61.5),
            }))
        );
        assert_eq!(
            parse_input_line("  click menu primary -3 7 "),
            Ok(Some(InputCommand::Click {
                surface: ClickSurface::Chrome,
                button: MouseButton::Primary,
                position_px: Vec2::new(-3.0, 7.0),
            }))
        );
    }

    #[test]
    fn room_control_lines_parse() {
        assert_eq!(
            parse_input_line("wave 4 ssww"),
            Ok(Some(InputCommand::Wave {
                number: 4,
                runner_movements: "ssww".to_string()
            }))
        );
        assert_eq!(
            parse_input_line("wave 1"),
            Ok(Some(InputCommand::Wave {
                number: 1,
                runner_movements: String::new()
            }))
        );
        assert_eq!(
            parse_input_line("mode fast"),
            Ok(Some(InputCommand::Mode(RoomMode::FastForward)))
        );
        assert_eq!(parse_input_line("step"), Ok(Some(InputCommand::Step)));
        assert_eq!(parse_input_line("quit"), Ok(Some(InputCommand::Quit)));
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_input_line(""), Ok(None));
        assert_eq!(parse_input_line("   "), Ok(None));
        assert_eq!(parse_input_line("# walk to the trap"), Ok(None));
    }

    #[test]
    fn malformed_lines_report_usage() {
        assert_eq!(
            parse_input_line("click map middle 1 2"),
            Err(CommandParseError::Usage(CLICK_USAGE))
        );
        assert_eq!(
            parse_input_line("move 1"),
            Err(CommandParseError::Usage(MOVE_USAGE))
        );
        assert_eq!(
            parse_input_line("move x 2"),
            Err(CommandParseError::InvalidNumber("x".to_string()))
        );
        assert_eq!(
            parse_input_line("mode rewind"),
            Err(CommandParseError::Usage(MODE_USAGE))
        );
        assert_eq!(
            parse_input_line("dance"),
            Err(CommandParseError::Unknown("dance".to_string()))
        );
    }
}
