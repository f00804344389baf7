//! Operating modes of the control loop.
//!
//! The mode is the only piece of state both flows negotiate over: the
//! operator writes the requested mode, the sampling loop publishes the
//! mode it is actually running. Both live in atomic cells, hence the
//! `u8` representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One named operating state of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Mode {
    /// Vent all valves, keep sampling.
    Pause = 0,
    /// Valve outputs straight from the operator.
    UserControl = 1,
    /// Pressure references from the operator, PID closes the loop.
    UserReference = 2,
    /// First valve tracks a bending angle from two IMUs.
    ImuControl = 3,
    /// Gait pattern playback.
    ReferenceTracking = 4,
    /// Report the last recorded fault, then pause.
    Error = 5,
    /// Vent and release the hardware.
    Exit = 6,
    /// Terminal, no handler runs.
    Quit = 7,
}

/// Unknown mode name or discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mode: {0}")]
pub struct UnknownMode(pub String);

impl Mode {
    /// Every mode, in discriminant order.
    pub const ALL: [Mode; 8] = [
        Mode::Pause,
        Mode::UserControl,
        Mode::UserReference,
        Mode::ImuControl,
        Mode::ReferenceTracking,
        Mode::Error,
        Mode::Exit,
        Mode::Quit,
    ];

    /// Canonical upper-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Mode::Pause => "PAUSE",
            Mode::UserControl => "USER_CONTROL",
            Mode::UserReference => "USER_REFERENCE",
            Mode::ImuControl => "IMU_CONTROL",
            Mode::ReferenceTracking => "REFERENCE_TRACKING",
            Mode::Error => "ERROR",
            Mode::Exit => "EXIT",
            Mode::Quit => "QUIT",
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Mode::as_u8`].
    pub const fn from_u8(raw: u8) -> Option<Mode> {
        match raw {
            0 => Some(Mode::Pause),
            1 => Some(Mode::UserControl),
            2 => Some(Mode::UserReference),
            3 => Some(Mode::ImuControl),
            4 => Some(Mode::ReferenceTracking),
            5 => Some(Mode::Error),
            6 => Some(Mode::Exit),
            7 => Some(Mode::Quit),
            _ => None,
        }
    }

    /// Only `QUIT` stops the dispatcher.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Mode::Quit)
    }

    /// Modes whose handler runs a fixed-period sampling loop.
    #[inline]
    pub const fn is_sampling(self) -> bool {
        matches!(
            self,
            Mode::Pause
                | Mode::UserControl
                | Mode::UserReference
                | Mode::ImuControl
                | Mode::ReferenceTracking
        )
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for mode in Mode::ALL {
            assert_eq!(mode.as_str().parse::<Mode>(), Ok(mode));
            assert_eq!(mode.to_string(), mode.as_str());
        }
        assert_eq!(" user_control ".parse::<Mode>(), Ok(Mode::UserControl));
        assert!("WALK".parse::<Mode>().is_err());
    }

    #[test]
    fn discriminants_are_lossless() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_u8(mode.as_u8()), Some(mode));
        }
        assert_eq!(Mode::from_u8(8), None);
    }

    #[test]
    fn only_quit_is_terminal() {
        let terminal: Vec<_> = Mode::ALL.into_iter().filter(|m| m.is_terminal()).collect();
        assert_eq!(terminal, vec![Mode::Quit]);
        assert!(!Mode::Error.is_sampling());
        assert!(!Mode::Exit.is_sampling());
        assert!(Mode::ImuControl.is_sampling());
    }

    #[test]
    fn serde_uses_canonical_names() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            mode: Mode,
        }
        let text = toml::to_string(&Wrapper {
            mode: Mode::ReferenceTracking,
        })
        .unwrap();
        assert!(text.contains("REFERENCE_TRACKING"));
        let back: Wrapper = toml::from_str("mode = \"IMU_CONTROL\"").unwrap();
        assert_eq!(back.mode, Mode::ImuControl);
    }
}
