//! Link state and advertised identity.
//!
//! The pure half of the GAP layer: which link state the device is in, what
//! name it advertises, and what must happen after each stack event. The
//! esp32-nimble wiring in [`crate::ble`] feeds events in and executes the
//! returned action.

use log::{info, warn};

/// A complete local name has to fit the 31-byte advertising payload.
pub const MAX_NAME_LEN: usize = 31;

/// Name advertised until someone renames the device.
pub const DEFAULT_NAME: &str = "eVolte_01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Advertising,
    Connected,
}

/// Events from the BLE host stack, reduced to what the session cares about.
#[derive(Debug, Clone, Copy)]
pub enum GapEvent {
    Connected { status: i32 },
    Disconnected,
    AdvComplete,
}

/// What the wiring must do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Advertise,
}

/// Mutable GAP session state: link state plus advertised device name.
///
/// Lives behind one mutex so that "set name, rebuild advertisement, restart"
/// is a single transaction and no stale name is ever advertised.
pub struct Session {
    state: LinkState,
    name: String,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: LinkState::Idle,
            name: DEFAULT_NAME.to_string(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the advertised name, truncated to [`MAX_NAME_LEN`] bytes on a
    /// character boundary.
    pub fn set_name(&mut self, name: &str) {
        let mut name = name;
        if name.len() > MAX_NAME_LEN {
            let mut cut = MAX_NAME_LEN;
            while !name.is_char_boundary(cut) {
                cut -= 1;
            }
            name = &name[..cut];
            warn!("device name truncated to {cut} bytes");
        }
        self.name = name.to_string();
    }

    /// Record that advertising (re)started.
    pub fn advertising_started(&mut self) {
        self.state = LinkState::Advertising;
    }

    /// Advance the state machine by one stack event and report whether a
    /// re-advertise is due. Every terminal event yields exactly one
    /// [`Action::Advertise`].
    pub fn handle_event(&mut self, event: GapEvent) -> Action {
        match event {
            GapEvent::Connected { status: 0 } => {
                info!("GAP connect OK");
                self.state = LinkState::Connected;
                Action::None
            }
            GapEvent::Connected { status } => {
                warn!("GAP connect failed (status {status}), re-advertising");
                self.state = LinkState::Advertising;
                Action::Advertise
            }
            GapEvent::Disconnected => {
                info!("GAP disconnected, re-advertising");
                self.state = LinkState::Advertising;
                Action::Advertise
            }
            GapEvent::AdvComplete => {
                info!("advertisement finished, restarting");
                self.state = LinkState::Advertising;
                Action::Advertise
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_advertises_with_the_default_name() {
        let mut session = Session::new();
        assert_eq!(session.state(), LinkState::Idle);
        assert_eq!(session.name(), "eVolte_01");

        session.advertising_started();
        assert_eq!(session.state(), LinkState::Advertising);
    }

    #[test]
    fn successful_connect_enters_connected() {
        let mut session = Session::new();
        session.advertising_started();

        let action = session.handle_event(GapEvent::Connected { status: 0 });
        assert_eq!(action, Action::None);
        assert_eq!(session.state(), LinkState::Connected);
    }

    #[test]
    fn failed_connect_readvertises_and_never_connects() {
        let mut session = Session::new();
        session.advertising_started();

        let action = session.handle_event(GapEvent::Connected { status: 14 });
        assert_eq!(action, Action::Advertise);
        assert_eq!(session.state(), LinkState::Advertising);
    }

    #[test]
    fn disconnect_readvertises_exactly_once() {
        let mut session = Session::new();
        session.advertising_started();
        session.handle_event(GapEvent::Connected { status: 0 });

        let action = session.handle_event(GapEvent::Disconnected);
        assert_eq!(action, Action::Advertise);
        assert_eq!(session.state(), LinkState::Advertising);
    }

    #[test]
    fn advertisement_completion_restarts_advertising() {
        let mut session = Session::new();
        session.advertising_started();

        let action = session.handle_event(GapEvent::AdvComplete);
        assert_eq!(action, Action::Advertise);
        assert_eq!(session.state(), LinkState::Advertising);
    }

    #[test]
    fn rename_applies_immediately() {
        let mut session = Session::new();
        session.advertising_started();

        session.set_name("Kitchen Light");
        assert_eq!(session.name(), "Kitchen Light");
    }

    #[test]
    fn overlong_names_are_truncated() {
        let mut session = Session::new();
        session.set_name("a name well beyond the thirty-one byte payload cap");
        assert_eq!(session.name().len(), MAX_NAME_LEN);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut session = Session::new();
        // 30 ASCII bytes followed by a 2-byte char that straddles the cap.
        let name = format!("{}é", "x".repeat(30));
        session.set_name(&name);
        assert_eq!(session.name(), "x".repeat(30));
    }
}
