//! Application core: event loop, overlays, and action dispatch.

use std::time::{Duration, Instant};

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ledwatch_core::{
    Console, CoreError, DeviceDraft, DeviceId, DevicePatch, Notification, NotificationLevel,
    ResetScope, TestTarget,
};

use crate::action::{Action, ConfirmAction, FormMode, FormSubmission};
use crate::component::Component;
use crate::data_bridge::spawn_data_bridge;
use crate::event::{Event, EventReader};
use crate::screens::console::ConsoleScreen;
use crate::screens::device_form::DeviceForm;
use crate::theme;
use crate::tui::Tui;

const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

/// Top-level application state and event loop.
pub struct App {
    console: Console,
    screen: ConsoleScreen,
    /// Add/edit popup; captures all input while open.
    device_form: Option<DeviceForm>,
    running: bool,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
    data_cancel: CancellationToken,
    /// Pending confirmation dialog (blocks other input while active).
    pending_confirm: Option<ConfirmAction>,
    notification: Option<(Notification, Instant)>,
}

impl App {
    pub fn new(console: Console) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        Self {
            console,
            screen: ConsoleScreen::new(),
            device_form: None,
            running: true,
            action_tx,
            action_rx,
            data_cancel: CancellationToken::new(),
            pending_confirm: None,
            notification: None,
        }
    }

    /// Run the main event loop until the user quits.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;
        self.screen.init(self.action_tx.clone())?;
        debug!(component = self.screen.id(), "component mounted");

        tokio::spawn(spawn_data_bridge(
            self.console.clone(),
            self.action_tx.clone(),
            self.data_cancel.clone(),
        ));

        let mut events = EventReader::new(
            Duration::from_millis(250), // 4 Hz tick
            Duration::from_millis(33),  // ~30 FPS render
        );

        info!("TUI event loop started");

        while self.running {
            let Some(event) = events.next().await else {
                break;
            };

            match event {
                Event::Key(key) => {
                    if let Some(action) = self.handle_key_event(key)? {
                        self.action_tx.send(action)?;
                    }
                }
                Event::Resize(w, h) => {
                    debug!(w, h, "terminal resized");
                    self.action_tx.send(Action::Render)?;
                }
                Event::Tick => self.action_tx.send(Action::Tick)?,
                Event::Render => self.action_tx.send(Action::Render)?,
            }

            while let Ok(action) = self.action_rx.try_recv() {
                self.process_action(&action)?;

                if let Action::Render = action {
                    tui.draw(|frame| self.render(frame))?;
                }
            }
        }

        events.stop();
        self.data_cancel.cancel();
        self.console.shutdown().await;
        tui.exit();
        info!("TUI event loop ended");
        Ok(())
    }

    // ── Input ────────────────────────────────────────────────────────

    /// Map a key press to an action. Overlays capture input first, then
    /// global console keys, then the screen's row keys.
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(Some(Action::Quit));
        }

        if self.pending_confirm.is_some() {
            return Ok(match key.code {
                KeyCode::Char('y' | 'Y') => Some(Action::ConfirmYes),
                KeyCode::Char('n' | 'N') | KeyCode::Esc => Some(Action::ConfirmNo),
                _ => None,
            });
        }

        if let Some(form) = self.device_form.as_mut() {
            return form.handle_key_event(key);
        }

        let action = match key.code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('a') => Action::OpenDeviceForm(FormMode::Add),
            KeyCode::Char('r') => Action::ResetContextual,
            KeyCode::Char('R') => Action::ResetAll,
            KeyCode::Char('c') => Action::ClearLogs,
            KeyCode::Char('t') => Action::SendTestMessage,
            KeyCode::Char('x') => Action::DisconnectSelected,
            KeyCode::Char('X') => Action::DisconnectAll,
            KeyCode::Char('p') => Action::ToggleTestSound,
            KeyCode::Char('s') => Action::CycleGlobalSound,
            KeyCode::Char('f') => Action::RefreshFleet,
            KeyCode::Esc if self.notification.is_some() => Action::DismissNotification,
            _ => return self.screen.handle_key_event(key),
        };
        Ok(Some(action))
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    fn process_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Quit => self.running = false,

            Action::Tick => {
                if let Some((_, shown)) = &self.notification {
                    if shown.elapsed() > NOTIFICATION_TTL {
                        self.notification = None;
                    }
                }
            }

            Action::ToggleSelect(id) => {
                self.console.toggle_selection(*id);
            }

            Action::ResetContextual => match self.console.primary_reset() {
                Ok(ResetScope::Alarm(id)) => {
                    self.notify(Notification::info(format!(
                        "Alarm reset for {}",
                        self.device_name(id)
                    )));
                }
                Ok(ResetScope::AllLeds) => self.notify(Notification::info("All LEDs reset")),
                Err(e) => self.command_failed("Reset", &e),
            },

            Action::ResetAll => match self.console.reset_all_leds() {
                Ok(()) => self.notify(Notification::info("All LEDs reset")),
                Err(e) => self.command_failed("Reset", &e),
            },

            Action::ClearLogs => self.console.clear_logs(),

            Action::SendTestMessage => match self.console.send_test_message() {
                Ok(TestTarget::Device(id)) => self.notify(Notification::info(format!(
                    "Test message sent to {}",
                    self.device_name(id)
                ))),
                Ok(TestTarget::All) => {
                    self.notify(Notification::info("Test message sent to all devices"));
                }
                Err(e) => self.command_failed("Test message", &e),
            },

            Action::DisconnectSelected => match self.console.disconnect_selected() {
                Ok(Some(id)) => self.notify(Notification::info(format!(
                    "Disconnected {}",
                    self.device_name(id)
                ))),
                Ok(None) => self.notify(Notification::warning("No device selected")),
                Err(e) => self.command_failed("Disconnect", &e),
            },

            Action::DisconnectAll => match self.console.disconnect_all() {
                Ok(count) => self.notify(Notification::info(disconnect_all_message(count))),
                Err(e) => self.command_failed("Disconnect", &e),
            },

            Action::ToggleTestSound => {
                let state = self.console.toggle_test_sound();
                debug!(?state, "test sound toggled");
            }

            Action::CycleGlobalSound => match self.console.cycle_global_sound() {
                Ok(sound) => self.notify(Notification::info(format!("Global sound: {sound}"))),
                Err(e) => self.command_failed("Sound change", &e),
            },

            Action::SetDeviceSound(id) => {
                let sound = self.console.global_sound();
                match self.console.set_default_sound(*id, &sound) {
                    Ok(()) => self.notify(Notification::info(format!(
                        "Default sound for {} set to {sound}",
                        self.device_name(*id)
                    ))),
                    Err(e) => self.command_failed("Sound change", &e),
                }
            }

            Action::RefreshFleet => {
                if let Err(e) = self.console.request_fleet_snapshot() {
                    self.command_failed("Refresh", &e);
                }
            }

            Action::OpenDeviceForm(mode) => self.open_form(*mode),

            Action::CloseDeviceForm => self.close_form(),

            Action::SubmitDeviceForm(submission) => {
                self.close_form();
                self.spawn_save(submission.clone());
            }

            Action::ShowConfirm(confirm) => self.pending_confirm = Some(confirm.clone()),

            Action::ConfirmYes => {
                if let Some(confirm) = self.pending_confirm.take() {
                    self.execute_confirm(confirm);
                }
            }

            Action::ConfirmNo => self.pending_confirm = None,

            Action::Notify(n) => self.notification = Some((n.clone(), Instant::now())),

            Action::DismissNotification => self.notification = None,

            _ => {}
        }

        // The screen mirrors console data and animates on ticks.
        if let Some(follow_up) = self.screen.update(action)? {
            self.action_tx.send(follow_up)?;
        }

        Ok(())
    }

    fn open_form(&mut self, mode: FormMode) {
        let form = match mode {
            FormMode::Add => DeviceForm::add(),
            FormMode::Edit(id) => match self.console.fleet().device(id) {
                Some(device) => DeviceForm::edit(&device),
                None => {
                    self.notify(Notification::error(format!("Device {id} not found")));
                    return;
                }
            },
        };
        debug!(mode = ?form.mode(), "device form opened");
        self.device_form = Some(form);
        self.screen.set_focused(false);
    }

    fn close_form(&mut self) {
        self.device_form = None;
        self.screen.set_focused(true);
    }

    /// Queue a warning toast when a real speaker is attached but no sound
    /// in the library has a file behind it.
    pub fn warn_if_silent(&self, speaker_live: bool) {
        if speaker_live && !self.console.library().has_playable_file() {
            warn!("audio output is open but no sound files were found");
            self.notify(Notification::warning(
                "No alarm sound files found. Set sounds_dir or pass --sounds-dir",
            ));
        }
    }

    // ── Command execution ────────────────────────────────────────────

    fn notify(&self, notification: Notification) {
        let _ = self.action_tx.send(Action::Notify(notification));
    }

    fn command_failed(&self, what: &str, err: &CoreError) {
        warn!(error = %err, "{what} failed");
        self.notify(Notification::error(format!("{what} failed: {err}")));
    }

    fn device_name(&self, id: DeviceId) -> String {
        self.console
            .fleet()
            .device(id)
            .map_or_else(|| format!("device {id}"), |d| d.name)
    }

    /// Registry calls run off the event loop. Their outcome reaches the
    /// user through the console's notifications and the refreshed fleet.
    fn spawn_save(&self, submission: FormSubmission) {
        let console = self.console.clone();
        tokio::spawn(async move {
            let FormSubmission {
                mode,
                name,
                ip,
                mac,
            } = submission;
            let result = match mode {
                FormMode::Add => {
                    let mac = (!mac.is_empty()).then_some(mac);
                    console.add_device(DeviceDraft { name, ip, mac }).await
                }
                FormMode::Edit(id) => {
                    let patch = DevicePatch {
                        name: Some(name),
                        ip: Some(ip),
                        mac: Some(mac),
                    };
                    console.update_device(id, patch).await
                }
            };
            if let Err(e) = result {
                debug!(error = %e, "device save failed");
            }
        });
    }

    fn execute_confirm(&self, confirm: ConfirmAction) {
        match confirm {
            ConfirmAction::DeleteDevice { id, name } => {
                let console = self.console.clone();
                tokio::spawn(async move {
                    if let Err(e) = console.delete_device(id).await {
                        debug!(error = %e, device = %name, "device delete failed");
                    }
                });
            }
        }
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        self.screen.render(frame, area);

        if let Some(form) = &self.device_form {
            form.render(frame, area);
        }
        if let Some(confirm) = &self.pending_confirm {
            Self::render_confirm_dialog(frame, area, confirm);
        }
        if let Some((notification, _)) = &self.notification {
            Self::render_notification(frame, area, notification);
        }
    }

    fn render_confirm_dialog(frame: &mut Frame, area: Rect, confirm: &ConfirmAction) {
        let prompt = confirm.prompt();
        let width = u16::try_from(prompt.chars().count() + 6)
            .unwrap_or(u16::MAX)
            .clamp(40, 70)
            .min(area.width.saturating_sub(4));
        let height = 5u16;

        let x = area.width.saturating_sub(width) / 2;
        let y = area.height.saturating_sub(height) / 2;
        let dialog_area = Rect::new(area.x + x, area.y + y, width, height);

        frame.render_widget(
            Block::default().style(Style::default().bg(theme::BG_DARK)),
            dialog_area,
        );

        let block = Block::default()
            .title(" Confirm Deletion ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme::ELECTRIC_YELLOW));
        let inner = block.inner(dialog_area);
        frame.render_widget(block, dialog_area);

        let text = vec![
            Line::from(Span::styled(
                format!("  {prompt}"),
                Style::default().fg(theme::DIM_WHITE),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("  y ", theme::key_hint_key()),
                Span::styled("delete    ", theme::key_hint()),
                Span::styled("n ", theme::key_hint_key()),
                Span::styled("cancel", theme::key_hint()),
            ]),
        ];
        frame.render_widget(Paragraph::new(text), inner);
    }

    /// Toast in the bottom-right corner, above the key hints.
    fn render_notification(frame: &mut Frame, area: Rect, notif: &Notification) {
        let msg_len = u16::try_from(notif.message.chars().count()).unwrap_or(u16::MAX);
        let width = msg_len.saturating_add(6).clamp(20, 60);
        let height = 3u16;

        let x = area.width.saturating_sub(width + 1);
        let y = area.height.saturating_sub(height + 2);
        let toast_area = Rect::new(area.x + x, area.y + y, width.min(area.width), height);

        let border_color = theme::notification_color(notif.level);
        let icon = match notif.level {
            NotificationLevel::Success => "✓",
            NotificationLevel::Error => "✗",
            NotificationLevel::Warning => "!",
            NotificationLevel::Info => "·",
        };

        frame.render_widget(
            Block::default().style(Style::default().bg(theme::BG_DARK)),
            toast_area,
        );

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border_color));
        let inner = block.inner(toast_area);
        frame.render_widget(block, toast_area);

        let line = Line::from(vec![
            Span::styled(format!(" {icon} "), Style::default().fg(border_color)),
            Span::styled(notif.message.as_str(), Style::default().fg(theme::DIM_WHITE)),
        ]);
        frame.render_widget(Paragraph::new(line), inner);
    }
}

fn disconnect_all_message(count: usize) -> String {
    match count {
        0 => "No connected devices".into(),
        1 => "Disconnect sent to 1 device".into(),
        n => format!("Disconnect sent to {n} devices"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use crossterm::event::{KeyEventKind, KeyEventState};
    use ledwatch_api::{ChannelEvent, RegistryClient, RelayCommand, RelayEvent, RelayPublisher};
    use ledwatch_core::{
        DeviceRecord, LedState, MemoryPreferences, SilentAudio, SoundLibrary,
    };
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::UnboundedReceiver;
    use url::Url;

    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn app() -> (App, UnboundedReceiver<RelayCommand>) {
        let (publisher, commands) = RelayPublisher::channel();
        let registry = RegistryClient::with_client(
            ledwatch_api::TransportConfig::default().build_client().unwrap(),
            Url::parse("http://127.0.0.1:9").unwrap(),
        );
        let console = Console::with_parts(
            publisher,
            registry,
            Box::new(SilentAudio::new()),
            SoundLibrary::from_names(["beep.mp3", "horn.mp3"], "beep.mp3"),
            Arc::new(MemoryPreferences::new()),
        );
        (App::new(console), commands)
    }

    fn with_fleet(app: &App, devices: Vec<DeviceRecord>) {
        app.console
            .handle_channel_event(ChannelEvent::Message(RelayEvent::FleetSnapshot(devices)));
    }

    fn device(id: i64, name: &str, led_state: LedState) -> DeviceRecord {
        DeviceRecord {
            id: DeviceId(id),
            name: name.into(),
            ip: format!("10.0.0.{id}"),
            mac: None,
            led_state,
        }
    }

    fn drain_actions(app: &mut App) -> Vec<Action> {
        let mut out = Vec::new();
        while let Ok(action) = app.action_rx.try_recv() {
            out.push(action);
        }
        out
    }

    #[test]
    fn global_keys_map_to_console_actions() {
        let (mut app, _commands) = app();
        let cases = [
            ('r', "ResetContextual"),
            ('R', "ResetAll"),
            ('c', "ClearLogs"),
            ('t', "SendTestMessage"),
            ('x', "DisconnectSelected"),
            ('X', "DisconnectAll"),
            ('p', "ToggleTestSound"),
            ('s', "CycleGlobalSound"),
            ('f', "RefreshFleet"),
            ('q', "Quit"),
        ];
        for (c, expected) in cases {
            let action = app.handle_key_event(key(KeyCode::Char(c))).unwrap().unwrap();
            assert_eq!(format!("{action:?}"), expected, "key {c}");
        }
    }

    #[test]
    fn confirm_dialog_captures_input() {
        let (mut app, _commands) = app();
        app.pending_confirm = Some(ConfirmAction::DeleteDevice {
            id: DeviceId(1),
            name: "Lobby".into(),
        });

        assert!(app.handle_key_event(key(KeyCode::Char('q'))).unwrap().is_none());
        assert!(matches!(
            app.handle_key_event(key(KeyCode::Char('y'))).unwrap(),
            Some(Action::ConfirmYes)
        ));
        assert!(matches!(
            app.handle_key_event(key(KeyCode::Esc)).unwrap(),
            Some(Action::ConfirmNo)
        ));
    }

    #[test]
    fn open_form_swallows_console_keys() {
        let (mut app, _commands) = app();
        app.process_action(&Action::OpenDeviceForm(FormMode::Add))
            .unwrap();
        assert!(app.device_form.is_some());

        // 'q' is typed into the name field, not a quit.
        assert!(app.handle_key_event(key(KeyCode::Char('q'))).unwrap().is_none());
        assert!(app.running);

        let close = app.handle_key_event(key(KeyCode::Esc)).unwrap().unwrap();
        app.process_action(&close).unwrap();
        assert!(app.device_form.is_none());
    }

    #[test]
    fn editing_an_unknown_device_notifies() {
        let (mut app, _commands) = app();
        app.process_action(&Action::OpenDeviceForm(FormMode::Edit(DeviceId(42))))
            .unwrap();

        assert!(app.device_form.is_none());
        let actions = drain_actions(&mut app);
        let Some(Action::Notify(n)) = actions.first() else {
            panic!("expected a notification, got {actions:?}");
        };
        assert_eq!(n.level, NotificationLevel::Error);
        assert_eq!(n.message, "Device 42 not found");
    }

    #[test]
    fn contextual_reset_targets_selected_alarming_device() {
        let (mut app, mut commands) = app();
        with_fleet(&app, vec![device(1, "Lobby", LedState::Alarm)]);
        app.console.handle_channel_event(ChannelEvent::Message(RelayEvent::AlarmPlay(
            ledwatch_api::AlarmPlay {
                client_id: DeviceId(1),
                sound: "horn.mp3".into(),
            },
        )));
        app.process_action(&Action::ToggleSelect(DeviceId(1))).unwrap();

        app.process_action(&Action::ResetContextual).unwrap();

        assert_eq!(
            commands.try_recv().unwrap(),
            RelayCommand::ResetAlarm {
                client_id: DeviceId(1)
            }
        );
        let actions = drain_actions(&mut app);
        assert!(actions.iter().any(
            |a| matches!(a, Action::Notify(n) if n.message == "Alarm reset for Lobby")
        ));
    }

    #[test]
    fn disconnect_without_selection_warns() {
        let (mut app, mut commands) = app();
        app.process_action(&Action::DisconnectSelected).unwrap();

        assert!(commands.try_recv().is_err());
        let actions = drain_actions(&mut app);
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::Notify(n) if n.level == NotificationLevel::Warning
        )));
    }

    #[test]
    fn device_sound_uses_the_global_sound() {
        let (mut app, mut commands) = app();
        with_fleet(&app, vec![device(2, "Dock", LedState::On)]);

        app.process_action(&Action::SetDeviceSound(DeviceId(2))).unwrap();

        assert_eq!(
            commands.try_recv().unwrap(),
            RelayCommand::SetDefaultSound {
                client_id: DeviceId(2),
                sound: "beep.mp3".into()
            }
        );
    }

    #[test]
    fn notifications_expire_on_tick() {
        let (mut app, _commands) = app();
        let shown = Instant::now().checked_sub(Duration::from_secs(4)).unwrap();
        app.notification = Some((Notification::success("Device added successfully"), shown));

        app.process_action(&Action::Tick).unwrap();
        assert!(app.notification.is_none());

        app.process_action(&Action::Notify(Notification::info("fresh")))
            .unwrap();
        app.process_action(&Action::Tick).unwrap();
        assert!(app.notification.is_some());
    }

    #[test]
    fn disconnect_all_wording() {
        assert_eq!(disconnect_all_message(0), "No connected devices");
        assert_eq!(disconnect_all_message(1), "Disconnect sent to 1 device");
        assert_eq!(disconnect_all_message(3), "Disconnect sent to 3 devices");
    }

    #[test]
    fn speaker_without_sound_files_warns() {
        let (mut app, _commands) = app();

        app.warn_if_silent(false);
        assert!(drain_actions(&mut app).is_empty());

        app.warn_if_silent(true);
        let actions = drain_actions(&mut app);
        assert_eq!(actions.len(), 1);
        assert!(matches!(
            &actions[0],
            Action::Notify(n) if n.level == NotificationLevel::Warning
        ));
    }
}
