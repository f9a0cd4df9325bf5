//! Add/edit device popup.
//!
//! Three text fields (name, IP, MAC). Tab/BackTab or ↑/↓ move between
//! fields, Enter submits, Esc closes. Name and IP must be non-blank before
//! anything is sent; the MAC may be left empty.

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};

use ledwatch_core::DeviceRecord;

use crate::action::{Action, FormMode, FormSubmission};
use crate::component::Component;
use crate::theme;

const REQUIRED_MESSAGE: &str = "Device name and IP address are required";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Ip,
    Mac,
}

impl Field {
    fn next(self) -> Self {
        match self {
            Self::Name => Self::Ip,
            Self::Ip => Self::Mac,
            Self::Mac => Self::Name,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Name => Self::Mac,
            Self::Ip => Self::Name,
            Self::Mac => Self::Ip,
        }
    }
}

pub struct DeviceForm {
    mode: FormMode,
    name: String,
    ip: String,
    mac: String,
    field: Field,
    error: Option<&'static str>,
}

impl DeviceForm {
    pub fn add() -> Self {
        Self {
            mode: FormMode::Add,
            name: String::new(),
            ip: String::new(),
            mac: String::new(),
            field: Field::Name,
            error: None,
        }
    }

    /// Pre-filled with the device's current values.
    pub fn edit(device: &DeviceRecord) -> Self {
        Self {
            mode: FormMode::Edit(device.id),
            name: device.name.clone(),
            ip: device.ip.clone(),
            mac: device.mac.clone().unwrap_or_default(),
            field: Field::Name,
            error: None,
        }
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    fn value_mut(&mut self) -> &mut String {
        match self.field {
            Field::Name => &mut self.name,
            Field::Ip => &mut self.ip,
            Field::Mac => &mut self.mac,
        }
    }

    fn submit(&mut self) -> Option<Action> {
        if self.name.trim().is_empty() || self.ip.trim().is_empty() {
            self.error = Some(REQUIRED_MESSAGE);
            return None;
        }
        Some(Action::SubmitDeviceForm(FormSubmission {
            mode: self.mode,
            name: self.name.trim().to_owned(),
            ip: self.ip.trim().to_owned(),
            mac: self.mac.trim().to_owned(),
        }))
    }

    fn render_input_field(
        frame: &mut Frame,
        area: Rect,
        label: &str,
        value: &str,
        active: bool,
    ) {
        if area.height < 3 {
            return;
        }

        let label_style = if active {
            Style::default().fg(theme::NEON_CYAN)
        } else {
            Style::default().fg(theme::DIM_WHITE)
        };
        frame.render_widget(
            Paragraph::new(Span::styled(label.to_owned(), label_style)),
            Rect::new(area.x, area.y, area.width, 1),
        );

        let border_color = if active {
            theme::ELECTRIC_PURPLE
        } else {
            theme::BORDER_GRAY
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border_color));

        let block_area = Rect::new(area.x, area.y + 1, area.width, 3.min(area.height - 1));
        let inner = block.inner(block_area);
        frame.render_widget(block, block_area);

        let text = if active {
            format!("{value}\u{2588}")
        } else {
            value.to_owned()
        };
        frame.render_widget(
            Paragraph::new(Span::styled(text, Style::default().fg(theme::DIM_WHITE))),
            inner,
        );
    }
}

impl Component for DeviceForm {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Esc => Some(Action::CloseDeviceForm),
            KeyCode::Enter => self.submit(),
            KeyCode::Tab | KeyCode::Down => {
                self.field = self.field.next();
                None
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.field = self.field.prev();
                None
            }
            KeyCode::Backspace => {
                self.value_mut().pop();
                None
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.value_mut().push(c);
                self.error = None;
                None
            }
            _ => None,
        };
        Ok(action)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let panel_w = 52u16.min(area.width.saturating_sub(4));
        let panel_h = 17u16.min(area.height.saturating_sub(2));
        let x = area.width.saturating_sub(panel_w) / 2;
        let y = area.height.saturating_sub(panel_h) / 2;
        let panel = Rect::new(area.x + x, area.y + y, panel_w, panel_h);

        frame.render_widget(
            Block::default().style(Style::default().bg(theme::BG_DARK)),
            panel,
        );

        let title = match self.mode {
            FormMode::Add => "Add Device",
            FormMode::Edit(_) => "Edit Device",
        };
        let block = Block::default()
            .title(Line::from(vec![
                Span::raw(" "),
                Span::styled(
                    title,
                    Style::default()
                        .fg(theme::NEON_CYAN)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
            ]))
            .title_alignment(Alignment::Center)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme::ELECTRIC_PURPLE));
        let inner = block.inner(panel);
        frame.render_widget(block, panel);

        let rows = Layout::vertical([
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

        Self::render_input_field(frame, rows[0], "Name", &self.name, self.field == Field::Name);
        Self::render_input_field(frame, rows[1], "IP address", &self.ip, self.field == Field::Ip);
        Self::render_input_field(
            frame,
            rows[2],
            "MAC address (optional)",
            &self.mac,
            self.field == Field::Mac,
        );

        if let Some(error) = self.error {
            frame.render_widget(
                Paragraph::new(Span::styled(error, Style::default().fg(theme::ERROR_RED))),
                rows[3],
            );
        }

        let hints = Line::from(vec![
            Span::styled("Tab ", theme::key_hint_key()),
            Span::styled("next  ", theme::key_hint()),
            Span::styled("Enter ", theme::key_hint_key()),
            Span::styled("save  ", theme::key_hint()),
            Span::styled("Esc ", theme::key_hint_key()),
            Span::styled("cancel", theme::key_hint()),
        ]);
        frame.render_widget(Paragraph::new(hints), rows[4]);
    }

    fn id(&self) -> &str {
        "device-form"
    }
}
