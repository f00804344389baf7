//! Mode dispatcher.
//!
//! A name → handler table. `run` looks up the handler of the requested
//! mode, runs it to completion and installs the mode it returns, until a
//! terminal mode is requested.
//!
//! ```text
//!   ┌──────────────┐  requested   ┌─────────┐  returns next  ┌──────────────┐
//!   │ requested    │─────────────▶│ handler │───────────────▶│ install_mode │
//!   │ mode         │◀─────────────┴─────────┴────────────────┴──────────────┘
//!   └──────┬───────┘
//!          │ terminal
//!          ▼
//!        return
//! ```
//!
//! Handler failures propagate out of `run` unless a fault route is set, in
//! which case the failure is recorded on the context and the fault mode is
//! installed instead.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use tracing::{debug, error};

use crate::error::DispatchError;

/// What the dispatcher needs from a context.
pub trait Dispatchable<M> {
    /// Mode currently requested.
    fn requested_mode(&self) -> M;

    /// Move the request from `from` to `next` unless it moved meanwhile.
    /// Returns the mode now requested.
    fn install_mode(&mut self, from: M, next: M) -> M;

    /// Unconditional store.
    fn force_mode(&mut self, mode: M);

    /// Keep a handler failure for the fault mode to report.
    fn record_fault(&mut self, mode: M, message: String);
}

/// A mode handler: runs until its mode is no longer requested.
pub type Handler<C, M, E> = Box<dyn FnMut(&mut C) -> Result<M, E>>;

enum Slot<C, M, E> {
    Handler(Handler<C, M, E>),
    Terminal,
}

/// Table-driven mode dispatcher.
pub struct Dispatcher<M, C, E> {
    slots: HashMap<M, Slot<C, M, E>>,
    initial: Option<M>,
    fault_mode: Option<M>,
}

impl<M, C, E> Dispatcher<M, C, E>
where
    M: Copy + Eq + Hash + fmt::Display,
    C: Dispatchable<M>,
    E: std::error::Error + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            initial: None,
            fault_mode: None,
        }
    }

    /// Register `handler` for `mode`, replacing any previous entry.
    pub fn register<F>(&mut self, mode: M, handler: F) -> &mut Self
    where
        F: FnMut(&mut C) -> Result<M, E> + 'static,
    {
        self.slots.insert(mode, Slot::Handler(Box::new(handler)));
        self
    }

    /// Register `mode` as terminal: `run` returns when it is requested.
    pub fn register_terminal(&mut self, mode: M) -> &mut Self {
        self.slots.insert(mode, Slot::Terminal);
        self
    }

    /// Mode installed when `run` starts.
    pub fn set_initial(&mut self, mode: M) -> &mut Self {
        self.initial = Some(mode);
        self
    }

    /// Route handler failures into `mode` instead of returning them.
    ///
    /// A failure of the fault mode's own handler still propagates.
    pub fn route_faults_to(&mut self, mode: M) -> &mut Self {
        self.fault_mode = Some(mode);
        self
    }

    #[inline]
    pub fn is_registered(&self, mode: M) -> bool {
        self.slots.contains_key(&mode)
    }

    /// Dispatch until a terminal mode is requested; returns that mode.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NoInitialMode`] before [`Dispatcher::set_initial`],
    /// [`DispatchError::NoHandler`] for an unregistered mode, and
    /// [`DispatchError::Handler`] for an unrouted handler failure.
    pub fn run(&mut self, ctx: &mut C) -> Result<M, DispatchError<E>> {
        let initial = self.initial.ok_or(DispatchError::NoInitialMode)?;
        ctx.force_mode(initial);

        loop {
            let mode = ctx.requested_mode();
            let handler = match self.slots.get_mut(&mode) {
                None => return Err(DispatchError::NoHandler(mode.to_string())),
                Some(Slot::Terminal) => {
                    debug!("Reached terminal mode {mode}");
                    return Ok(mode);
                }
                Some(Slot::Handler(h)) => h,
            };

            match handler(ctx) {
                Ok(next) => {
                    let installed = ctx.install_mode(mode, next);
                    debug!("{mode} returned {next}, now requested {installed}");
                }
                Err(e) => match self.fault_mode {
                    Some(fault) if fault != mode => {
                        error!("Mode {mode} failed: {e}");
                        ctx.record_fault(mode, e.to_string());
                        let installed = ctx.install_mode(mode, fault);
                        debug!("Fault route {mode} -> {fault}, now requested {installed}");
                    }
                    _ => {
                        return Err(DispatchError::Handler {
                            mode: mode.to_string(),
                            source: e,
                        });
                    }
                },
            }
        }
    }
}

impl<M, C, E> Default for Dispatcher<M, C, E>
where
    M: Copy + Eq + Hash + fmt::Display,
    C: Dispatchable<M>,
    E: std::error::Error + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
