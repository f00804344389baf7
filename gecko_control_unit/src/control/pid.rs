//! PID controller with backward Euler integration, derivative filter (Tf),
//! and anti-windup via back-calculation (Tt).
//!
//! Zero Ki disables integral; zero Kd disables derivative; zero `out_max`
//! disables the output bound.

use gecko_common::control_unit::config::PidConfig;

/// Anything that turns a reference and a measurement into a bounded
/// actuator command.
pub trait Controller: Send {
    /// One control step.
    fn output(&mut self, reference: f64, measured: f64) -> f64;

    /// Forget integrator and derivative history.
    fn reset(&mut self);
}

/// Internal state of the PID controller.
///
/// Preserves integral accumulator and filtered derivative across cycles.
/// Reset on every mode entry that uses the controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidState {
    /// Integral accumulator.
    integral: f64,
    /// Previous error (for derivative).
    prev_error: f64,
    /// Filtered derivative term (low-pass via Tf).
    derivative_filtered: f64,
    /// Previous raw (unsaturated) PID output, for anti-windup.
    prev_raw_output: f64,
}

impl PidState {
    /// Reset all internal state to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn integral(&self) -> f64 {
        self.integral
    }
}

/// PID gains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain (0 = disabled).
    pub ki: f64,
    /// Derivative gain (0 = disabled).
    pub kd: f64,
    /// Derivative filter time constant [s] (0 = unfiltered).
    pub tf: f64,
    /// Anti-windup tracking time constant [s] (0 = disabled).
    pub tt: f64,
    /// Symmetric output bound (0 = unbounded).
    pub out_max: f64,
}

impl From<&PidConfig> for PidGains {
    fn from(c: &PidConfig) -> Self {
        Self {
            kp: c.kp,
            ki: c.ki,
            kd: c.kd,
            tf: c.tf,
            tt: c.tt,
            out_max: c.out_max,
        }
    }
}

/// Compute one PID cycle using backward Euler integration.
///
/// # Arguments
/// - `state`: Mutable PID internal state (integral, derivative, etc.).
/// - `gains`: PID gains.
/// - `error`: Current error (reference − measured).
/// - `dt`: Sampling interval [s].
///
/// # Returns
/// Raw PID output (unsaturated; see [`saturate`]).
#[inline]
pub fn pid_compute(state: &mut PidState, gains: &PidGains, error: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        return 0.0;
    }

    // ── P term ──────────────────────────────────────────────
    let p_term = gains.kp * error;

    // ── I term (backward Euler) ─────────────────────────────
    let i_term = if gains.ki != 0.0 {
        // Back-calculation: the amount the previous output was clipped by
        // bleeds out of the integral.
        let anti_windup = if gains.tt > 0.0 && gains.out_max > 0.0 {
            let saturated = saturate(state.prev_raw_output, gains.out_max);
            (saturated - state.prev_raw_output) / gains.tt
        } else {
            0.0
        };

        state.integral += (gains.ki * error + anti_windup) * dt;
        state.integral
    } else {
        state.integral = 0.0;
        0.0
    };

    // ── D term (with first-order filter) ────────────────────
    let d_term = if gains.kd != 0.0 {
        let raw_derivative = (error - state.prev_error) / dt;

        if gains.tf > 0.0 {
            // alpha = dt / (tf + dt)
            let alpha = dt / (gains.tf + dt);
            state.derivative_filtered += alpha * (raw_derivative - state.derivative_filtered);
            gains.kd * state.derivative_filtered
        } else {
            gains.kd * raw_derivative
        }
    } else {
        state.derivative_filtered = 0.0;
        0.0
    };

    state.prev_error = error;

    let raw_output = p_term + i_term + d_term;
    state.prev_raw_output = raw_output;

    raw_output
}

/// Clamp `value` to `[-out_max, out_max]`; `out_max <= 0` leaves it alone.
#[inline]
pub fn saturate(value: f64, out_max: f64) -> f64 {
    if out_max > 0.0 {
        value.clamp(-out_max, out_max)
    } else {
        value
    }
}

// ─── Controller ─────────────────────────────────────────────────────

/// Bounded PID controller with a fixed sampling interval.
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    dt: f64,
    state: PidState,
}

impl PidController {
    pub fn new(gains: PidGains, dt: f64) -> Self {
        Self {
            gains,
            dt,
            state: PidState::default(),
        }
    }

    #[inline]
    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    #[inline]
    pub fn state(&self) -> &PidState {
        &self.state
    }
}

impl Controller for PidController {
    #[inline]
    fn output(&mut self, reference: f64, measured: f64) -> f64 {
        let raw = pid_compute(&mut self.state, &self.gains, reference - measured, self.dt);
        saturate(raw, self.gains.out_max)
    }

    fn reset(&mut self) {
        self.state.reset();
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
