// ── Console facade ──
//
// Wires the relay channel, the push-fed stores, the alarm orchestrator and
// the registry bridge into one cheaply cloneable handle. Every push event
// is handled by a single dispatch task, sequentially and to completion.
// User actions run on the caller's task.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ledwatch_api::{
    ChannelEvent, DashboardStatus, DeviceDraft, DeviceId, DevicePatch, EventKind, LedState,
    RegistryClient, RelayCommand, RelayEvent, RelayHandle, RelayPublisher, TestTarget,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alarm::{AlarmOrchestrator, AlarmState, AudioChannel, SoundLibrary};
use crate::config::ConsoleConfig;
use crate::error::CoreError;
use crate::notification::{Notification, Notifier};
use crate::preferences::{PreferenceStore, Preferences};
use crate::registry_bridge::RegistryBridge;
use crate::router::EventRouter;
use crate::store::{DeviceList, FleetStore, LedMap, LogHistory, LogStore, StatusStore};
use crate::stream::SnapshotStream;

/// Sounds offered when no sounds directory is configured.
pub const BUILTIN_SOUNDS: &[&str] = &["beep.mp3", "chime.mp3", "horn.mp3", "siren.mp3"];

const PLAYBACK_POLL_INTERVAL: Duration = Duration::from_millis(250);

// ── ConnectionState ──────────────────────────────────────────────────

/// Relay connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// The relay loop gave up or was shut down.
    Failed,
}

/// Which reset [`Console::primary_reset`] issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    Alarm(DeviceId),
    AllLeds,
}

// ── Console ──────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ConsoleInner>`.
#[derive(Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

struct ConsoleInner {
    fleet: Arc<FleetStore>,
    status: Arc<StatusStore>,
    logs: Arc<LogStore>,
    alarm: Arc<AlarmOrchestrator>,
    router: EventRouter,
    publisher: RelayPublisher,
    registry: RegistryBridge,
    preferences: Preferences,
    notifier: Notifier,
    selection: Arc<watch::Sender<Option<DeviceId>>>,
    global_sound: watch::Sender<String>,
    connection_state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Console {
    /// Assemble a console around an existing publisher and registry client.
    ///
    /// Push handlers are registered here, once. Nothing is spawned; feed
    /// channel events through [`handle_channel_event`](Self::handle_channel_event)
    /// or use [`connect`](Self::connect).
    pub fn with_parts(
        publisher: RelayPublisher,
        registry: RegistryClient,
        audio: Box<dyn AudioChannel>,
        library: SoundLibrary,
        preference_store: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self::assemble(
            publisher,
            registry,
            audio,
            library,
            preference_store,
            CancellationToken::new(),
        )
    }

    fn assemble(
        publisher: RelayPublisher,
        registry: RegistryClient,
        audio: Box<dyn AudioChannel>,
        library: SoundLibrary,
        preference_store: Arc<dyn PreferenceStore>,
        cancel: CancellationToken,
    ) -> Self {
        let fleet = Arc::new(FleetStore::new());
        let status = Arc::new(StatusStore::new());
        let logs = Arc::new(LogStore::new());
        let alarm = Arc::new(AlarmOrchestrator::new(audio, library));
        let notifier = Notifier::new();
        let (selection, _) = watch::channel(None);
        let selection = Arc::new(selection);

        let preferences = Preferences::new(preference_store);
        let (global_sound, _) = watch::channel(preferences.global_sound());
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);

        let router = build_router(&fleet, &status, &logs, &alarm, &selection);
        let registry = RegistryBridge::new(
            registry,
            publisher.clone(),
            Arc::clone(&fleet),
            notifier.clone(),
        );

        Self {
            inner: Arc::new(ConsoleInner {
                fleet,
                status,
                logs,
                alarm,
                router,
                publisher,
                registry,
                preferences,
                notifier,
                selection,
                global_sound,
                connection_state,
                cancel,
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Start a console session against the relay and registry in `config`.
    ///
    /// Returns once the background tasks are spawned; the relay handshake
    /// happens in the background and shows up in
    /// [`connection_state`](Self::connection_state). Must be called inside
    /// a Tokio runtime.
    pub fn connect(
        config: &ConsoleConfig,
        audio: Box<dyn AudioChannel>,
        preference_store: Arc<dyn PreferenceStore>,
    ) -> Result<Self, CoreError> {
        let registry = RegistryClient::new(config.registry_url.clone(), &config.transport())?;
        let library = load_library(config);

        let cancel = CancellationToken::new();
        let handle = RelayHandle::connect(
            config.relay_url.clone(),
            config.reconnect.clone(),
            cancel.clone(),
        )?;
        let (events, publisher, _relay_cancel) = handle.into_parts();

        let console = Self::assemble(
            publisher,
            registry,
            audio,
            library,
            preference_store,
            cancel,
        );
        console.set_connection_state(ConnectionState::Connecting);

        let task = tokio::spawn(dispatch_task(
            console.clone(),
            events,
            console.inner.cancel.clone(),
        ));
        console
            .inner
            .task_handles
            .lock()
            .expect("task handle lock poisoned")
            .push(task);

        info!(relay = %config.relay_url, registry = %config.registry_url, "console started");
        Ok(console)
    }

    /// Stop background tasks and the relay loop.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handles: Vec<_> = self
            .inner
            .task_handles
            .lock()
            .expect("task handle lock poisoned")
            .drain(..)
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
        self.inner.alarm.stop_all();
        self.set_connection_state(ConnectionState::Disconnected);
        debug!("console shut down");
    }

    // ── Inbound ──────────────────────────────────────────────────────

    /// Apply one relay lifecycle marker or push event.
    pub fn handle_channel_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                info!("relay connected");
                self.set_connection_state(ConnectionState::Connected);
            }
            ChannelEvent::Message(event) => {
                self.inner.router.dispatch(&event);
            }
            ChannelEvent::Disconnected { reason } => {
                warn!(%reason, "relay disconnected");
                self.inner.router.notify_disconnect();
                self.set_connection_state(ConnectionState::Disconnected);
                self.inner
                    .notifier
                    .notify(Notification::warning(format!("Relay connection lost: {reason}")));
            }
            ChannelEvent::Reconnecting { attempt, delay } => {
                debug!(attempt, ?delay, "relay reconnect scheduled");
                self.set_connection_state(ConnectionState::Reconnecting {
                    attempt: attempt + 1,
                });
            }
        }
    }

    /// The relay loop ended for good.
    fn relay_gone(&self) {
        warn!("relay loop exited");
        self.inner.router.notify_disconnect();
        self.set_connection_state(ConnectionState::Failed);
        self.inner
            .notifier
            .notify(Notification::error("Relay unreachable, giving up"));
    }

    /// Event kinds no handler is registered for. Empty for a fully wired
    /// console.
    pub fn unhandled_kinds(&self) -> Vec<EventKind> {
        self.inner.router.unhandled_kinds()
    }

    // ── Relay commands ───────────────────────────────────────────────

    /// Reset every indicator. Local audio stops immediately.
    pub fn reset_all_leds(&self) -> Result<(), CoreError> {
        self.inner.alarm.stop_all();
        self.publish(RelayCommand::ResetAllLeds)
    }

    /// Empty the local log and ask the relay to do the same.
    ///
    /// The local clear is not rolled back if the publish fails.
    pub fn clear_logs(&self) {
        self.inner.logs.clear();
        if let Err(e) = self.publish(RelayCommand::ClearLogs) {
            warn!(error = %e, "clear_logs not delivered");
        }
    }

    pub fn reset_alarm(&self, client_id: DeviceId) -> Result<(), CoreError> {
        self.publish(RelayCommand::ResetAlarm { client_id })
    }

    /// Reset the selected device's alarm if it is the one alarming,
    /// otherwise reset every indicator.
    pub fn primary_reset(&self) -> Result<ResetScope, CoreError> {
        let alarming = self.inner.alarm.state().alarming_client();
        match (self.selected(), alarming) {
            (Some(selected), Some(alarming)) if selected == alarming => {
                self.reset_alarm(selected)?;
                Ok(ResetScope::Alarm(selected))
            }
            _ => {
                self.reset_all_leds()?;
                Ok(ResetScope::AllLeds)
            }
        }
    }

    /// Send a test message to the selected device, or to all devices when
    /// nothing is selected. Returns the target used.
    pub fn send_test_message(&self) -> Result<TestTarget, CoreError> {
        let target = self.selected().map_or(TestTarget::All, TestTarget::Device);
        self.publish(RelayCommand::SendTestMessage { client_id: target })?;
        Ok(target)
    }

    pub fn disconnect_device(&self, client_id: DeviceId) -> Result<(), CoreError> {
        self.publish(RelayCommand::DisconnectClient { client_id })?;
        self.clear_selection();
        Ok(())
    }

    /// Disconnect the selected device. `None` if nothing was selected.
    pub fn disconnect_selected(&self) -> Result<Option<DeviceId>, CoreError> {
        let Some(id) = self.selected() else {
            return Ok(None);
        };
        self.disconnect_device(id)?;
        Ok(Some(id))
    }

    /// Disconnect every device whose indicator is not off. Returns how many
    /// commands were published.
    pub fn disconnect_all(&self) -> Result<usize, CoreError> {
        let devices = self.inner.fleet.devices();
        let mut count = 0;
        for device in devices.iter().filter(|d| d.led_state != LedState::Off) {
            self.publish(RelayCommand::DisconnectClient {
                client_id: device.id,
            })?;
            count += 1;
        }
        self.clear_selection();
        info!(count, "disconnect requested for active devices");
        Ok(count)
    }

    pub fn request_fleet_snapshot(&self) -> Result<(), CoreError> {
        self.publish(RelayCommand::RequestFleetSnapshot)
    }

    // ── Sounds ───────────────────────────────────────────────────────

    pub fn global_sound(&self) -> String {
        self.inner.global_sound.borrow().clone()
    }

    pub fn subscribe_global_sound(&self) -> watch::Receiver<String> {
        self.inner.global_sound.subscribe()
    }

    /// Make `sound` the global alarm sound: persist it, then tell the relay.
    ///
    /// A persistence failure is reported but does not stop the change for
    /// this session.
    pub fn set_global_sound(&self, sound: &str) -> Result<(), CoreError> {
        if !self.inner.alarm.library().contains(sound) {
            return Err(CoreError::validation(format!("Unknown sound: {sound}")));
        }
        if let Err(e) = self.inner.preferences.set_global_sound(sound) {
            warn!(error = %e, "cannot persist global sound");
            self.inner
                .notifier
                .notify(Notification::error(format!("Sound not saved: {e}")));
        }
        self.inner.global_sound.send_replace(sound.to_owned());
        info!(sound, "global sound set");
        self.publish(RelayCommand::SetGlobalSound {
            sound: sound.to_owned(),
        })
    }

    /// Advance the global sound to the next one in the library.
    pub fn cycle_global_sound(&self) -> Result<String, CoreError> {
        let next = self
            .inner
            .alarm
            .library()
            .next_after(&self.global_sound())
            .name
            .clone();
        self.set_global_sound(&next)?;
        Ok(next)
    }

    pub fn set_default_sound(&self, client_id: DeviceId, sound: &str) -> Result<(), CoreError> {
        self.publish(RelayCommand::SetDefaultSound {
            client_id,
            sound: sound.to_owned(),
        })
    }

    /// Start or stop the test preview of the global sound.
    pub fn toggle_test_sound(&self) -> AlarmState {
        self.inner.alarm.toggle_test(&self.global_sound())
    }

    pub fn library(&self) -> &SoundLibrary {
        self.inner.alarm.library()
    }

    // ── Selection ────────────────────────────────────────────────────

    pub fn selected(&self) -> Option<DeviceId> {
        *self.inner.selection.borrow()
    }

    pub fn select(&self, id: Option<DeviceId>) {
        self.inner.selection.send_replace(id);
    }

    /// Select `id`, or clear the selection if `id` is already selected.
    pub fn toggle_selection(&self, id: DeviceId) -> Option<DeviceId> {
        let mut next = None;
        self.inner.selection.send_modify(|sel| {
            *sel = if *sel == Some(id) { None } else { Some(id) };
            next = *sel;
        });
        next
    }

    pub fn clear_selection(&self) {
        self.inner.selection.send_replace(None);
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Option<DeviceId>> {
        self.inner.selection.subscribe()
    }

    // ── Registry ─────────────────────────────────────────────────────

    pub async fn add_device(&self, draft: DeviceDraft) -> Result<DeviceId, CoreError> {
        self.inner.registry.add_device(draft).await
    }

    pub async fn update_device(
        &self,
        id: DeviceId,
        patch: DevicePatch,
    ) -> Result<DeviceId, CoreError> {
        self.inner.registry.update_device(id, patch).await
    }

    pub async fn rename_device(&self, id: DeviceId, name: &str) -> Result<DeviceId, CoreError> {
        self.inner.registry.rename_device(id, name).await
    }

    pub async fn delete_device(&self, id: DeviceId) -> Result<(), CoreError> {
        self.inner.registry.delete_device(id).await?;
        prune_selection(&self.inner.selection, &self.inner.fleet.devices());
        Ok(())
    }

    // ── Snapshots and streams ────────────────────────────────────────

    pub fn fleet(&self) -> &Arc<FleetStore> {
        &self.inner.fleet
    }

    pub fn devices(&self) -> SnapshotStream<DeviceList> {
        self.inner.fleet.subscribe_devices()
    }

    pub fn led_states(&self) -> SnapshotStream<LedMap> {
        self.inner.fleet.subscribe_led_states()
    }

    pub fn dashboard(&self) -> SnapshotStream<DashboardStatus> {
        self.inner.status.subscribe()
    }

    pub fn dashboard_snapshot(&self) -> Arc<DashboardStatus> {
        self.inner.status.current()
    }

    pub fn logs(&self) -> &Arc<LogStore> {
        &self.inner.logs
    }

    pub fn log_entries(&self) -> SnapshotStream<LogHistory> {
        self.inner.logs.subscribe()
    }

    pub fn alarm(&self) -> &Arc<AlarmOrchestrator> {
        &self.inner.alarm
    }

    pub fn alarm_state(&self) -> watch::Receiver<AlarmState> {
        self.inner.alarm.subscribe()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.inner.notifier.subscribe()
    }

    /// Post a notification to every subscriber.
    pub fn notify(&self, notification: Notification) {
        self.inner.notifier.notify(notification);
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn publish(&self, command: RelayCommand) -> Result<(), CoreError> {
        self.inner.publisher.publish(command).map_err(CoreError::from)
    }

    fn set_connection_state(&self, state: ConnectionState) {
        self.inner.connection_state.send_replace(state);
    }
}

// ── Handler wiring ───────────────────────────────────────────────────

/// Register the push handlers. Stores update before the orchestrator
/// reconciles against them.
fn build_router(
    fleet: &Arc<FleetStore>,
    status: &Arc<StatusStore>,
    logs: &Arc<LogStore>,
    alarm: &Arc<AlarmOrchestrator>,
    selection: &Arc<watch::Sender<Option<DeviceId>>>,
) -> EventRouter {
    let mut router = EventRouter::new();

    {
        let fleet = Arc::clone(fleet);
        let alarm = Arc::clone(alarm);
        let selection = Arc::clone(selection);
        router.subscribe(EventKind::FleetSnapshot, move |event| {
            if let RelayEvent::FleetSnapshot(devices) = event {
                fleet.replace_devices(devices.clone());
                alarm.reconcile(devices);
                prune_selection(&selection, devices);
            }
        });
    }
    {
        let fleet = Arc::clone(fleet);
        router.subscribe(EventKind::IndicatorMap, move |event| {
            if let RelayEvent::IndicatorMap(map) = event {
                fleet.replace_led_states(map.clone());
            }
        });
    }
    {
        let status = Arc::clone(status);
        router.subscribe(EventKind::StatusUpdate, move |event| {
            if let RelayEvent::StatusUpdate(update) = event {
                status.replace(update.clone());
            }
        });
    }
    {
        let logs_all = Arc::clone(logs);
        router.subscribe(EventKind::LogSnapshot, move |event| {
            if let RelayEvent::LogSnapshot(entries) = event {
                logs_all.replace(entries.clone());
            }
        });
        let logs_one = Arc::clone(logs);
        router.subscribe(EventKind::LogAppend, move |event| {
            if let RelayEvent::LogAppend(entry) = event {
                logs_one.append(entry.clone());
            }
        });
    }
    {
        let play = Arc::clone(alarm);
        router.subscribe(EventKind::AlarmPlay, move |event| {
            if let RelayEvent::AlarmPlay(request) = event {
                play.play_alarm(request.client_id, &request.sound);
            }
        });
        let stop = Arc::clone(alarm);
        router.subscribe(EventKind::AlarmStopAll, move |_| stop.stop_all());
    }
    {
        let fleet = Arc::clone(fleet);
        let alarm = Arc::clone(alarm);
        let selection = Arc::clone(selection);
        router.on_disconnect(move || {
            fleet.clear_devices();
            alarm.stop_all();
            selection.send_replace(None);
        });
    }

    router
}

/// Clear the selection if its device is no longer listed.
fn prune_selection(selection: &watch::Sender<Option<DeviceId>>, devices: &[ledwatch_api::DeviceRecord]) {
    selection.send_if_modified(|sel| match *sel {
        Some(id) if !devices.iter().any(|d| d.id == id) => {
            debug!(%id, "selected device left the fleet");
            *sel = None;
            true
        }
        _ => false,
    });
}

fn load_library(config: &ConsoleConfig) -> SoundLibrary {
    if let Some(dir) = &config.sounds_dir {
        match SoundLibrary::scan(dir, &config.default_sound) {
            Ok(library) => return library,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot scan sounds directory, using built-in list");
            }
        }
    }
    SoundLibrary::from_names(BUILTIN_SOUNDS.iter().copied(), &config.default_sound)
}

// ── Background task ──────────────────────────────────────────────────

/// Drains the relay channel and polls test playback.
async fn dispatch_task(
    console: Console,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
    cancel: CancellationToken,
) {
    let mut poll = tokio::time::interval(PLAYBACK_POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => console.handle_channel_event(event),
                None => {
                    console.relay_gone();
                    break;
                }
            },
            _ = poll.tick() => console.inner.alarm.poll_playback(),
        }
    }
    debug!("dispatch task exited");
}
