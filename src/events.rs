//! Maps front-end input events onto the registry.
//!
//! Window chrome stays behind [`WindowControl`]; the session core never calls it.

use crate::registry::{CloseOutcome, SessionRegistry};
use crate::session::SessionId;
use tokio::task::JoinHandle;
use tracing::debug;

/// Fire-and-forget window requests supplied by the host UI.
pub trait WindowControl: Send + Sync {
    fn minimize(&self);
    fn toggle_maximize(&self);
    fn close(&self);
    /// Asks the host to give keyboard focus back to the input line.
    fn focus_input(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Enter. Ignored while the active session is busy.
    Submit,
    HistoryUp,
    HistoryDown,
    InputChanged(String),
    NewTab,
    /// Close-tab accelerator or a tab's close button; `None` targets the active tab.
    CloseTab(Option<SessionId>),
    SelectTab(SessionId),
    Minimize,
    ToggleMaximize,
    CloseWindow,
    WindowFocused,
}

#[derive(Debug)]
pub enum EventOutcome {
    Handled,
    Ignored,
    Dispatched(JoinHandle<()>),
    WindowClosing,
}

pub fn handle_event(registry: &mut SessionRegistry, window: &dyn WindowControl, event: UiEvent) -> EventOutcome {
    let Some(active) = registry.active_id() else {
        // Still bootstrapping: only tab creation and chrome make sense.
        return match event {
            UiEvent::NewTab => {
                registry.create();
                EventOutcome::Handled
            }
            UiEvent::Minimize | UiEvent::ToggleMaximize | UiEvent::CloseWindow => handle_chrome(window, event),
            _ => EventOutcome::Ignored,
        };
    };

    match event {
        UiEvent::Submit => match registry.spawn_submit_pending(active) {
            Ok(Some(task)) => EventOutcome::Dispatched(task),
            _ => EventOutcome::Ignored,
        },
        UiEvent::HistoryUp => outcome_of(registry.history_up(active).is_ok()),
        UiEvent::HistoryDown => outcome_of(registry.history_down(active).is_ok()),
        UiEvent::InputChanged(text) => outcome_of(registry.set_pending_input(active, &text).is_ok()),
        UiEvent::NewTab => {
            registry.create();
            window.focus_input();
            EventOutcome::Handled
        }
        UiEvent::CloseTab(target) => match registry.close(target.unwrap_or(active)) {
            CloseOutcome::Closed => {
                window.focus_input();
                EventOutcome::Handled
            }
            CloseOutcome::LastSession => {
                debug!("Last tab closed; closing window");
                window.close();
                EventOutcome::WindowClosing
            }
            CloseOutcome::NotFound => EventOutcome::Ignored,
        },
        UiEvent::SelectTab(id) => {
            if registry.set_active(id) {
                window.focus_input();
                EventOutcome::Handled
            } else {
                EventOutcome::Ignored
            }
        }
        UiEvent::WindowFocused => {
            window.focus_input();
            EventOutcome::Handled
        }
        UiEvent::Minimize | UiEvent::ToggleMaximize | UiEvent::CloseWindow => handle_chrome(window, event),
    }
}

fn handle_chrome(window: &dyn WindowControl, event: UiEvent) -> EventOutcome {
    match event {
        UiEvent::Minimize => window.minimize(),
        UiEvent::ToggleMaximize => window.toggle_maximize(),
        UiEvent::CloseWindow => {
            window.close();
            return EventOutcome::WindowClosing;
        }
        _ => return EventOutcome::Ignored,
    }
    EventOutcome::Handled
}

fn outcome_of(found: bool) -> EventOutcome {
    if found {
        EventOutcome::Handled
    } else {
        EventOutcome::Ignored
    }
}
