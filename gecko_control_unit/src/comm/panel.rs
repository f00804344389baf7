//! Push-button operator panel.
//!
//! Three mode buttons (`USER_CONTROL`, `USER_REFERENCE`,
//! `REFERENCE_TRACKING`), a confirm and an infinite-mode button, analog
//! knobs for references or duties, switches for the discrete valves and one
//! LED per button.
//!
//! Buttons act on rising edges. When several mode buttons rise in the same
//! poll the last in the order above wins. After a mode button the panel
//! waits, without blocking, until the loop runs the new mode before it
//! writes any task.

use gecko_common::mode::Mode;

use super::link::OperatorLink;
use super::thread::{CommEndpoint, EndpointStatus};
use crate::error::CommError;

/// Panel push-buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    UserControl,
    UserReference,
    ReferenceTracking,
    Confirm,
    Infinite,
}

impl Button {
    pub const ALL: [Button; 5] = [
        Button::UserControl,
        Button::UserReference,
        Button::ReferenceTracking,
        Button::Confirm,
        Button::Infinite,
    ];

    /// Mode selected by a mode button.
    pub const fn mode(self) -> Option<Mode> {
        match self {
            Button::UserControl => Some(Mode::UserControl),
            Button::UserReference => Some(Mode::UserReference),
            Button::ReferenceTracking => Some(Mode::ReferenceTracking),
            Button::Confirm | Button::Infinite => None,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Panel LEDs, one per button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    UserControl,
    UserReference,
    ReferenceTracking,
    /// Lit while a gait session is active.
    Confirm,
    Infinite,
}

/// Panel hardware.
pub trait OperatorPanel: Send {
    /// Current level of `button`.
    fn button(&mut self, button: Button) -> Result<bool, CommError>;

    fn analog_channels(&self) -> usize;

    /// Knob `channel`, normalized to `[0, 1]`.
    fn analog(&mut self, channel: usize) -> Result<f64, CommError>;

    fn switch_count(&self) -> usize;

    fn switch(&mut self, index: usize) -> Result<bool, CommError>;

    fn set_led(&mut self, led: Led, on: bool) -> Result<(), CommError>;
}

/// [`CommEndpoint`] over an [`OperatorPanel`].
pub struct PanelEndpoint<P> {
    panel: P,
    levels: [bool; 5],
    /// Mode requested by a button that the loop has not reached yet.
    pending: Option<Mode>,
    knobs: Vec<f64>,
    switches: Vec<bool>,
}

impl<P: OperatorPanel> PanelEndpoint<P> {
    pub fn new(panel: P) -> Self {
        let knobs = vec![0.0; panel.analog_channels()];
        let switches = vec![false; panel.switch_count()];
        Self {
            panel,
            levels: [false; 5],
            pending: None,
            knobs,
            switches,
        }
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn pending(&self) -> Option<Mode> {
        self.pending
    }

    /// Sample every button, return the ones that rose since the last poll.
    fn rising_edges(&mut self) -> Result<[bool; 5], CommError> {
        let mut rising = [false; 5];
        for button in Button::ALL {
            let level = self.panel.button(button)?;
            let i = button.index();
            rising[i] = level && !self.levels[i];
            self.levels[i] = level;
        }
        Ok(rising)
    }

    fn read_knobs(&mut self) -> Result<&[f64], CommError> {
        for (channel, slot) in self.knobs.iter_mut().enumerate() {
            *slot = self.panel.analog(channel)?;
        }
        Ok(&self.knobs)
    }

    fn read_switches(&mut self) -> Result<&[bool], CommError> {
        for (index, slot) in self.switches.iter_mut().enumerate() {
            *slot = self.panel.switch(index)?;
        }
        Ok(&self.switches)
    }

    fn update_leds(&mut self, link: &OperatorLink) -> Result<(), CommError> {
        let running = link.running_mode();
        let gait = link.gait_status();
        self.panel.set_led(Led::UserControl, running == Mode::UserControl)?;
        self.panel.set_led(Led::UserReference, running == Mode::UserReference)?;
        self.panel
            .set_led(Led::ReferenceTracking, running == Mode::ReferenceTracking)?;
        self.panel.set_led(Led::Confirm, gait.is_active)?;
        self.panel.set_led(Led::Infinite, gait.infinite_mode)?;
        Ok(())
    }
}

impl<P: OperatorPanel> CommEndpoint for PanelEndpoint<P> {
    fn name(&self) -> &str {
        "panel"
    }

    fn poll(&mut self, link: &OperatorLink) -> Result<EndpointStatus, CommError> {
        let rising = self.rising_edges()?;

        let pressed = Button::ALL
            .into_iter()
            .filter(|b| rising[b.index()])
            .filter_map(Button::mode)
            .last();
        if let Some(mode) = pressed {
            if link.request_mode(mode) {
                self.pending = Some(mode);
            }
        }

        // Someone else moved the request; stop waiting for ours.
        if self.pending.is_some_and(|m| m != link.requested_mode()) {
            self.pending = None;
        }
        if let Some(mode) = self.pending {
            if link.running_mode() != mode {
                self.update_leds(link)?;
                return Ok(EndpointStatus::Continue);
            }
            self.pending = None;
        }

        match link.requested_mode() {
            Mode::UserControl => {
                let duties = self.read_knobs()?.to_vec();
                link.set_duties(&duties);
                let dvalves = self.read_switches()?.to_vec();
                link.set_dvalves(&dvalves);
            }
            Mode::UserReference => {
                let refs = self.read_knobs()?.to_vec();
                link.set_references(&refs);
                let dvalves = self.read_switches()?.to_vec();
                link.set_dvalves(&dvalves);
            }
            Mode::ReferenceTracking => {
                if rising[Button::Confirm.index()] {
                    link.toggle_confirm();
                }
                if rising[Button::Infinite.index()] {
                    link.toggle_infinite_mode();
                }
            }
            _ => {}
        }

        self.update_leds(link)?;
        Ok(EndpointStatus::Continue)
    }
}
