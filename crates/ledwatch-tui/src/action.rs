//! Action enum. Every state change in the TUI flows through here.

use std::sync::Arc;

use ledwatch_core::{
    AlarmState, ConnectionState, DashboardStatus, DeviceId, DeviceList, LedMap, LogHistory,
    Notification,
};

/// What the device form is editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Edit(DeviceId),
}

/// Field values captured when the device form is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    pub mode: FormMode,
    pub name: String,
    pub ip: String,
    pub mac: String,
}

/// Operations that need a y/n confirmation before running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteDevice { id: DeviceId, name: String },
}

impl ConfirmAction {
    pub fn prompt(&self) -> String {
        match self {
            Self::DeleteDevice { name, .. } => {
                format!("Are you sure you want to delete the device \"{name}\"?")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    // ── Lifecycle ──
    Quit,
    Tick,
    Render,

    // ── Console data (from the data bridge) ──
    DevicesUpdated(Arc<DeviceList>),
    LedStatesUpdated(Arc<LedMap>),
    DashboardUpdated(Arc<DashboardStatus>),
    LogsUpdated(Arc<LogHistory>),
    AlarmChanged(AlarmState),
    ConnectionChanged(ConnectionState),
    SelectionChanged(Option<DeviceId>),
    GlobalSoundChanged(String),

    // ── Relay commands ──
    ToggleSelect(DeviceId),
    ResetContextual,
    ResetAll,
    ClearLogs,
    SendTestMessage,
    DisconnectSelected,
    DisconnectAll,
    ToggleTestSound,
    CycleGlobalSound,
    SetDeviceSound(DeviceId),
    RefreshFleet,

    // ── Registry ──
    OpenDeviceForm(FormMode),
    CloseDeviceForm,
    SubmitDeviceForm(FormSubmission),

    // ── Overlays ──
    ShowConfirm(ConfirmAction),
    ConfirmYes,
    ConfirmNo,
    Notify(Notification),
    DismissNotification,
}
