//! Data bridge: forwards [`Console`] streams into the TUI action loop.
//!
//! Sends an initial snapshot of everything, then one action per change
//! until cancelled. The bridge never mutates console state.

use ledwatch_core::Console;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::action::Action;

pub async fn spawn_data_bridge(
    console: Console,
    action_tx: mpsc::UnboundedSender<Action>,
    cancel: CancellationToken,
) {
    let mut devices = console.devices();
    let mut led_states = console.led_states();
    let mut dashboard = console.dashboard();
    let mut logs = console.log_entries();
    let mut alarm = console.alarm_state();
    let mut connection = console.connection_state();
    let mut selection = console.subscribe_selection();
    let mut global_sound = console.subscribe_global_sound();
    let mut notifications = console.notifications();

    let initial = [
        Action::DevicesUpdated(devices.current().clone()),
        Action::LedStatesUpdated(led_states.current().clone()),
        Action::DashboardUpdated(dashboard.current().clone()),
        Action::LogsUpdated(logs.current().clone()),
        Action::AlarmChanged(alarm.borrow_and_update().clone()),
        Action::ConnectionChanged(connection.borrow_and_update().clone()),
        Action::SelectionChanged(*selection.borrow_and_update()),
        Action::GlobalSoundChanged(global_sound.borrow_and_update().clone()),
    ];
    for action in initial {
        let _ = action_tx.send(action);
    }

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            Ok(()) = connection.changed() => {
                let state = connection.borrow_and_update().clone();
                debug!(?state, "Dispatching ConnectionChanged");
                let _ = action_tx.send(Action::ConnectionChanged(state));
            }
            Ok(()) = alarm.changed() => {
                let state = alarm.borrow_and_update().clone();
                let _ = action_tx.send(Action::AlarmChanged(state));
            }
            Some(d) = devices.changed() => {
                let _ = action_tx.send(Action::DevicesUpdated(d));
            }
            Some(l) = led_states.changed() => {
                let _ = action_tx.send(Action::LedStatesUpdated(l));
            }
            Some(s) = dashboard.changed() => {
                let _ = action_tx.send(Action::DashboardUpdated(s));
            }
            Some(entries) = logs.changed() => {
                let _ = action_tx.send(Action::LogsUpdated(entries));
            }
            Ok(()) = selection.changed() => {
                let selected = *selection.borrow_and_update();
                let _ = action_tx.send(Action::SelectionChanged(selected));
            }
            Ok(()) = global_sound.changed() => {
                let sound = global_sound.borrow_and_update().clone();
                let _ = action_tx.send(Action::GlobalSoundChanged(sound));
            }
            result = notifications.recv() => match result {
                Ok(n) => {
                    let _ = action_tx.send(Action::Notify(n));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notification stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            else => break,
        }
    }

    debug!("data bridge stopped");
}
