//! LED indicator glyph: `●` lit, `○` dark. Blink and alarm flash.

use ledwatch_core::LedState;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::theme;

const LIT: &str = "●";
const DARK: &str = "○";

/// Glyph for `state` at the given flash phase.
///
/// | State       | phase on | phase off |
/// |-------------|----------|-----------|
/// | `off`       | `○`      | `○`       |
/// | `on`        | `●`      | `●`       |
/// | `connected` | `●`      | `●`       |
/// | `blink`     | `●`      | `○`       |
/// | `alarm`     | `●`      | `○`       |
pub fn glyph(state: &LedState, phase_on: bool) -> &'static str {
    match state {
        LedState::Off => DARK,
        LedState::Blink | LedState::Alarm if !phase_on => DARK,
        _ => LIT,
    }
}

/// Styled indicator followed by the state name.
pub fn led_line(state: &LedState, phase_on: bool) -> Line<'static> {
    let mut glyph_style = Style::default().fg(theme::led_color(state));
    if state.is_alarm() {
        glyph_style = glyph_style.add_modifier(Modifier::BOLD);
    }
    Line::from(vec![
        Span::styled(glyph(state, phase_on), glyph_style),
        Span::raw(" "),
        Span::styled(state.as_str().to_owned(), theme::table_row()),
    ])
}
