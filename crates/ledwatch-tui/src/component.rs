//! Shared shape of the console screen and the device form popup.
//!
//! The app routes keys to whichever one owns input (the form while it is
//! open, otherwise the screen) and feeds data actions from the relay
//! streams through `update`.

use color_eyre::eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::{Frame, layout::Rect};
use tokio::sync::mpsc::UnboundedSender;

use crate::action::Action;

/// Mounted once, then driven by the app loop.
pub trait Component: Send {
    /// Called once when mounted, with the sender for the app's action loop.
    fn init(&mut self, _action_tx: UnboundedSender<Action>) -> Result<()> {
        Ok(())
    }

    /// Handle a key press. Returns an action to dispatch, if any.
    fn handle_key_event(&mut self, _key: KeyEvent) -> Result<Option<Action>> {
        Ok(None)
    }

    /// Mirror a dispatched action, e.g. a new fleet snapshot. May return a
    /// follow-up action.
    fn update(&mut self, _action: &Action) -> Result<Option<Action>> {
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect);

    /// Cleared while an overlay (form or confirm dialog) holds input.
    fn set_focused(&mut self, _focused: bool) {}

    fn id(&self) -> &str;
}
