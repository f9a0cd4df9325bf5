//! Console screen with the dashboard header, device table and activity log.

use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, TableState};

use ledwatch_core::{
    AlarmState, ConnectionState, DashboardStatus, DeviceId, DeviceList, DeviceRecord, LedMap,
    LedState, LogEntry, LogHistory,
};

use crate::action::{Action, ConfirmAction, FormMode};
use crate::component::Component;
use crate::theme;
use crate::widgets::led_indicator;

pub struct ConsoleScreen {
    focused: bool,
    devices: Arc<DeviceList>,
    led_states: Arc<LedMap>,
    dashboard: Arc<DashboardStatus>,
    logs: Arc<LogHistory>,
    alarm: AlarmState,
    connection: ConnectionState,
    selected: Option<DeviceId>,
    global_sound: String,
    /// Highlighted row in the device table.
    cursor: usize,
    flash_on: bool,
}

impl ConsoleScreen {
    pub fn new() -> Self {
        Self {
            focused: true,
            devices: Arc::new(Vec::new()),
            led_states: Arc::new(LedMap::new()),
            dashboard: Arc::new(DashboardStatus::default()),
            logs: Arc::new(LogHistory::default()),
            alarm: AlarmState::Idle,
            connection: ConnectionState::Disconnected,
            selected: None,
            global_sound: String::new(),
            cursor: 0,
            flash_on: true,
        }
    }

    fn highlighted(&self) -> Option<&DeviceRecord> {
        self.devices.get(self.cursor)
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.devices.len();
        if len == 0 {
            self.cursor = 0;
            return;
        }
        self.cursor = self.cursor.saturating_add_signed(delta).min(len - 1);
    }

    /// The indicator map wins over the record's own state when present.
    fn led_for<'a>(&'a self, device: &'a DeviceRecord) -> &'a LedState {
        self.led_states.get(&device.id).unwrap_or(&device.led_state)
    }

    fn device_name(&self, id: DeviceId) -> String {
        self.devices
            .iter()
            .find(|d| d.id == id)
            .map_or_else(|| format!("#{id}"), |d| d.name.clone())
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" ledwatch ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let status = &self.dashboard;
        let (server_text, server_color) = if status.server_running {
            ("● running", theme::SUCCESS_GREEN)
        } else {
            ("○ stopped", theme::ERROR_RED)
        };
        let (conn_text, conn_color) = connection_label(&self.connection);
        let (alarm_text, alarm_color) = alarm_label(&self.alarm, |id| self.device_name(id));

        let label = |text: &'static str| Span::styled(text, theme::key_hint());
        let lines = vec![
            Line::from(vec![
                label(" Relay "),
                Span::styled(server_text, Style::default().fg(server_color)),
                label("   Link "),
                Span::styled(conn_text, Style::default().fg(conn_color)),
                label("   Clients "),
                Span::styled(status.client_count.to_string(), theme::title_style()),
                label("   Messages "),
                Span::styled(status.message_count.to_string(), theme::title_style()),
            ]),
            Line::from(vec![
                label(" Last activity "),
                Span::styled(
                    last_activity_label(&status.last_activity),
                    Style::default().fg(theme::DIM_WHITE),
                ),
                label("   Alarm "),
                Span::styled(alarm_text, Style::default().fg(alarm_color)),
                label("   Sound "),
                Span::styled(
                    self.global_sound.clone(),
                    Style::default().fg(theme::ELECTRIC_YELLOW),
                ),
            ]),
        ];
        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn render_devices(&self, frame: &mut Frame, area: Rect) {
        let border = if self.focused {
            theme::border_focused()
        } else {
            theme::border_default()
        };
        let block = Block::default()
            .title(format!(" Devices ({}) ", self.devices.len()))
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border);

        if self.devices.is_empty() {
            let empty = Paragraph::new(Line::from(Span::styled(
                "  No devices registered. Press a to add one.",
                theme::key_hint(),
            )))
            .block(block);
            frame.render_widget(empty, area);
            return;
        }

        let alarming = self.alarm.alarming_client();
        let header = Row::new(vec!["", "ID", "Name", "IP", "MAC", "LED"]).style(theme::table_header());
        let rows: Vec<Row> = self
            .devices
            .iter()
            .map(|device| {
                let marker = if self.selected == Some(device.id) { "▶" } else { " " };
                let row_style = if alarming == Some(device.id) {
                    theme::table_alarming()
                } else if self.selected == Some(device.id) {
                    theme::table_active()
                } else {
                    theme::table_row()
                };
                Row::new(vec![
                    Cell::from(marker),
                    Cell::from(device.id.to_string()),
                    Cell::from(device.name.clone()),
                    Cell::from(device.ip.clone()).style(Style::default().fg(theme::CORAL)),
                    Cell::from(device.mac.clone().unwrap_or_else(|| "-".into())),
                    Cell::from(led_indicator::led_line(self.led_for(device), self.flash_on)),
                ])
                .style(row_style)
            })
            .collect();

        let widths = [
            Constraint::Length(1),
            Constraint::Length(6),
            Constraint::Fill(2),
            Constraint::Length(16),
            Constraint::Length(18),
            Constraint::Length(14),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(theme::table_selected());

        let mut state = TableState::default().with_selected(Some(self.cursor));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn render_logs(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(format!(" Activity ({}) ", self.logs.len()))
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let lines: Vec<Line> = self
            .logs
            .newest_first()
            .take(usize::from(inner.height))
            .map(log_line)
            .collect();
        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn render_hints(frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::raw(" ")];
        for (key, label) in [
            ("j/k", "move"),
            ("Enter", "select"),
            ("a/e/d", "add/edit/delete"),
            ("r/R", "reset/all"),
            ("c", "clear log"),
            ("t", "test"),
            ("x/X", "disconnect/all"),
            ("p", "preview"),
            ("s/S", "sound/device"),
            ("f", "refresh"),
            ("q", "quit"),
        ] {
            spans.push(Span::styled(key, theme::key_hint_key()));
            spans.push(Span::styled(format!(" {label}  "), theme::key_hint()));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

impl Default for ConsoleScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for ConsoleScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.move_cursor(1);
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.move_cursor(-1);
                None
            }
            KeyCode::Char('g') | KeyCode::Home => {
                self.cursor = 0;
                None
            }
            KeyCode::Char('G') | KeyCode::End => {
                self.cursor = self.devices.len().saturating_sub(1);
                None
            }
            KeyCode::Enter => self.highlighted().map(|d| Action::ToggleSelect(d.id)),
            KeyCode::Char('e') => self
                .highlighted()
                .map(|d| Action::OpenDeviceForm(FormMode::Edit(d.id))),
            KeyCode::Char('d') => self.highlighted().map(|d| {
                Action::ShowConfirm(ConfirmAction::DeleteDevice {
                    id: d.id,
                    name: d.name.clone(),
                })
            }),
            KeyCode::Char('S') => self.highlighted().map(|d| Action::SetDeviceSound(d.id)),
            _ => None,
        };
        Ok(action)
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::DevicesUpdated(devices) => {
                self.devices = Arc::clone(devices);
                self.move_cursor(0);
            }
            Action::LedStatesUpdated(leds) => self.led_states = Arc::clone(leds),
            Action::DashboardUpdated(status) => self.dashboard = Arc::clone(status),
            Action::LogsUpdated(logs) => self.logs = Arc::clone(logs),
            Action::AlarmChanged(state) => self.alarm = state.clone(),
            Action::ConnectionChanged(state) => self.connection = state.clone(),
            Action::SelectionChanged(selected) => self.selected = *selected,
            Action::GlobalSoundChanged(sound) => self.global_sound.clone_from(sound),
            Action::Tick => self.flash_on = !self.flash_on,
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let layout = Layout::vertical([
            Constraint::Length(4),
            Constraint::Min(6),
            Constraint::Percentage(35),
            Constraint::Length(1),
        ])
        .split(area);

        self.render_header(frame, layout[0]);
        self.render_devices(frame, layout[1]);
        self.render_logs(frame, layout[2]);
        Self::render_hints(frame, layout[3]);
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn id(&self) -> &str {
        "console"
    }
}

// ── Formatting ───────────────────────────────────────────────────────

pub fn connection_label(state: &ConnectionState) -> (String, Color) {
    match state {
        ConnectionState::Connected => ("● connected".into(), theme::SUCCESS_GREEN),
        ConnectionState::Connecting => ("◐ connecting".into(), theme::ELECTRIC_YELLOW),
        ConnectionState::Reconnecting { attempt } => (
            format!("◐ reconnecting (attempt {attempt})"),
            theme::ELECTRIC_YELLOW,
        ),
        ConnectionState::Disconnected => ("○ disconnected".into(), theme::ERROR_RED),
        ConnectionState::Failed => ("✗ failed".into(), theme::ERROR_RED),
    }
}

pub fn alarm_label(state: &AlarmState, name_of: impl Fn(DeviceId) -> String) -> (String, Color) {
    match state {
        AlarmState::Idle => ("quiet".into(), theme::DIM_WHITE),
        AlarmState::Alarming { client_id, sound } => (
            format!("ALARM {} ({sound})", name_of(*client_id)),
            theme::ERROR_RED,
        ),
        AlarmState::TestPlaying { sound } => (format!("preview {sound}"), theme::NEON_CYAN),
    }
}

pub fn last_activity_label(raw: &str) -> String {
    if raw.trim().is_empty() {
        "never".into()
    } else {
        raw.to_owned()
    }
}

fn log_line(entry: &LogEntry) -> Line<'static> {
    let color = theme::severity_color(entry.kind.severity());
    Line::from(vec![
        Span::styled(format!(" {} ", entry.timestamp), theme::key_hint()),
        Span::styled(
            format!("{:<8}", entry.kind.as_str()),
            Style::default().fg(color),
        ),
        Span::styled(entry.message.clone(), Style::default().fg(theme::DIM_WHITE)),
    ])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crossterm::event::{KeyEventKind, KeyEventState, KeyModifiers};
    use ledwatch_core::LogKind;
    use pretty_assertions::assert_eq;

    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn device(id: i64, name: &str, led: LedState) -> DeviceRecord {
        DeviceRecord {
            id: DeviceId(id),
            name: name.into(),
            ip: format!("10.0.0.{id}"),
            mac: None,
            led_state: led,
        }
    }

    fn screen_with(devices: Vec<DeviceRecord>) -> ConsoleScreen {
        let mut screen = ConsoleScreen::new();
        screen
            .update(&Action::DevicesUpdated(Arc::new(devices)))
            .unwrap();
        screen
    }

    #[test]
    fn cursor_stays_within_the_table() {
        let mut screen = screen_with(vec![
            device(1, "Lobby", LedState::Off),
            device(2, "Dock", LedState::On),
        ]);

        screen.handle_key_event(key(KeyCode::Char('k'))).unwrap();
        assert_eq!(screen.cursor, 0);
        for _ in 0..5 {
            screen.handle_key_event(key(KeyCode::Char('j'))).unwrap();
        }
        assert_eq!(screen.cursor, 1);
    }

    #[test]
    fn shrinking_fleet_clamps_cursor() {
        let mut screen = screen_with(vec![
            device(1, "Lobby", LedState::Off),
            device(2, "Dock", LedState::On),
            device(3, "Yard", LedState::On),
        ]);
        screen.handle_key_event(key(KeyCode::Char('G'))).unwrap();
        assert_eq!(screen.cursor, 2);

        screen
            .update(&Action::DevicesUpdated(Arc::new(vec![device(
                1,
                "Lobby",
                LedState::Off,
            )])))
            .unwrap();
        assert_eq!(screen.cursor, 0);
    }

    #[test]
    fn enter_toggles_highlighted_device() {
        let mut screen = screen_with(vec![
            device(1, "Lobby", LedState::Off),
            device(2, "Dock", LedState::On),
        ]);
        screen.handle_key_event(key(KeyCode::Down)).unwrap();

        let action = screen.handle_key_event(key(KeyCode::Enter)).unwrap();
        assert!(matches!(action, Some(Action::ToggleSelect(DeviceId(2)))));
    }

    #[test]
    fn delete_asks_for_confirmation_by_name() {
        let mut screen = screen_with(vec![device(4, "Gate", LedState::Off)]);

        let action = screen.handle_key_event(key(KeyCode::Char('d'))).unwrap();
        let Some(Action::ShowConfirm(confirm)) = action else {
            panic!("expected confirm dialog");
        };
        assert_eq!(
            confirm,
            ConfirmAction::DeleteDevice {
                id: DeviceId(4),
                name: "Gate".into()
            }
        );
    }

    #[test]
    fn row_keys_do_nothing_on_empty_fleet() {
        let mut screen = ConsoleScreen::new();
        for code in [KeyCode::Enter, KeyCode::Char('e'), KeyCode::Char('d')] {
            assert!(screen.handle_key_event(key(code)).unwrap().is_none());
        }
    }

    #[test]
    fn indicator_map_overrides_record_state() {
        let mut screen = screen_with(vec![device(1, "Lobby", LedState::Off)]);
        let mut leds = LedMap::new();
        leds.insert(DeviceId(1), LedState::Alarm);
        screen
            .update(&Action::LedStatesUpdated(Arc::new(leds)))
            .unwrap();

        let record = screen.devices[0].clone();
        assert_eq!(screen.led_for(&record), &LedState::Alarm);
    }

    #[test]
    fn labels() {
        assert_eq!(
            connection_label(&ConnectionState::Reconnecting { attempt: 3 }).0,
            "◐ reconnecting (attempt 3)"
        );
        let (text, _) = alarm_label(
            &AlarmState::Alarming {
                client_id: DeviceId(9),
                sound: "siren.mp3".into(),
            },
            |id| format!("dev{id}"),
        );
        assert_eq!(text, "ALARM dev9 (siren.mp3)");
        assert_eq!(last_activity_label("  "), "never");
    }

    #[test]
    fn log_line_pads_the_kind() {
        let line = log_line(&LogEntry {
            timestamp: "12:00:01".into(),
            kind: LogKind::Recv,
            message: "button pressed".into(),
        });
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, " 12:00:01 RECV    button pressed");
    }
}
