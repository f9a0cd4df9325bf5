//! SilkCircuit Neon palette and semantic styling for the console.

use ledwatch_core::{LedState, LogSeverity, NotificationLevel};
use ratatui::style::{Color, Modifier, Style};

// ── Core Palette ──────────────────────────────────────────────────────

pub const ELECTRIC_PURPLE: Color = Color::Rgb(225, 53, 255); // #e135ff
pub const NEON_CYAN: Color = Color::Rgb(128, 255, 234); // #80ffea
pub const CORAL: Color = Color::Rgb(255, 106, 193); // #ff6ac1
pub const ELECTRIC_YELLOW: Color = Color::Rgb(241, 250, 140); // #f1fa8c
pub const SUCCESS_GREEN: Color = Color::Rgb(80, 250, 123); // #50fa7b
pub const ERROR_RED: Color = Color::Rgb(255, 99, 99); // #ff6363

// ── Extended Palette ──────────────────────────────────────────────────

pub const DIM_WHITE: Color = Color::Rgb(189, 193, 207); // #bdc1cf
pub const BORDER_GRAY: Color = Color::Rgb(98, 114, 164); // #6272a4
pub const BG_HIGHLIGHT: Color = Color::Rgb(40, 42, 54); // #282a36
pub const BG_DARK: Color = Color::Rgb(30, 31, 41); // #1e1f29
pub const LIGHT_BLUE: Color = Color::Rgb(139, 233, 253); // #8be9fd

// ── Semantic Styles ───────────────────────────────────────────────────

pub fn title_style() -> Style {
    Style::default().fg(NEON_CYAN).add_modifier(Modifier::BOLD)
}

pub fn border_focused() -> Style {
    Style::default().fg(ELECTRIC_PURPLE)
}

pub fn border_default() -> Style {
    Style::default().fg(BORDER_GRAY)
}

pub fn table_header() -> Style {
    Style::default()
        .fg(NEON_CYAN)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
}

pub fn table_row() -> Style {
    Style::default().fg(DIM_WHITE)
}

/// Cursor row in the device table.
pub fn table_selected() -> Style {
    Style::default()
        .fg(ELECTRIC_PURPLE)
        .bg(BG_HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

/// Row of the device the console has selected as its target.
pub fn table_active() -> Style {
    Style::default().fg(NEON_CYAN).add_modifier(Modifier::BOLD)
}

/// Row of the device currently driving the alarm.
pub fn table_alarming() -> Style {
    Style::default().fg(ERROR_RED).add_modifier(Modifier::BOLD)
}

pub fn key_hint() -> Style {
    Style::default().fg(BORDER_GRAY)
}

pub fn key_hint_key() -> Style {
    Style::default().fg(NEON_CYAN).add_modifier(Modifier::BOLD)
}

// ── Domain colors ─────────────────────────────────────────────────────

pub fn led_color(state: &LedState) -> Color {
    match state {
        LedState::Off => BORDER_GRAY,
        LedState::On => SUCCESS_GREEN,
        LedState::Blink => ELECTRIC_YELLOW,
        LedState::Alarm => ERROR_RED,
        LedState::Connected => LIGHT_BLUE,
        LedState::Other(_) => CORAL,
    }
}

pub fn severity_color(severity: LogSeverity) -> Color {
    match severity {
        LogSeverity::Error => ERROR_RED,
        LogSeverity::Event => LIGHT_BLUE,
        LogSeverity::Info => DIM_WHITE,
    }
}

pub fn notification_color(level: NotificationLevel) -> Color {
    match level {
        NotificationLevel::Success => SUCCESS_GREEN,
        NotificationLevel::Error => ERROR_RED,
        NotificationLevel::Warning => ELECTRIC_YELLOW,
        NotificationLevel::Info => NEON_CYAN,
    }
}
