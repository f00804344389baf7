//! The communication thread.
//!
//! Polls one [`CommEndpoint`] per sampling period until it is stopped, the
//! endpoint is done, or shutdown is requested. An endpoint failure requests
//! `EXIT` so the control loop releases the hardware.

use gecko_common::mode::Mode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{error, info};

use super::link::OperatorLink;
use crate::error::CommError;

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    Continue,
    /// Nothing left to do; the thread stops polling.
    Done,
}

/// A source of operator commands.
pub trait CommEndpoint: Send {
    fn name(&self) -> &str;

    /// Exchange one round of commands and telemetry. Must not block longer
    /// than a sampling period.
    fn poll(&mut self, link: &OperatorLink) -> Result<EndpointStatus, CommError>;
}

/// Handle on the running communication thread.
#[derive(Debug)]
pub struct CommThread {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    link: OperatorLink,
}

impl CommThread {
    /// Start polling `endpoint` on its own thread.
    pub fn spawn<E>(mut endpoint: E, link: OperatorLink) -> Result<Self, CommError>
    where
        E: CommEndpoint + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread_link = link.clone();

        let handle = thread::Builder::new()
            .name("gecko-comm".into())
            .spawn(move || {
                let link = thread_link;
                let period = link.sampling_period();
                info!("Running {} endpoint", endpoint.name());
                while !thread_stop.load(Ordering::Acquire)
                    && !matches!(link.requested_mode(), Mode::Exit | Mode::Quit)
                {
                    match endpoint.poll(&link) {
                        Ok(EndpointStatus::Continue) => thread::sleep(period),
                        Ok(EndpointStatus::Done) => {
                            info!("{} endpoint done", endpoint.name());
                            break;
                        }
                        Err(e) => {
                            error!("{} endpoint failed: {e}", endpoint.name());
                            link.request_mode(Mode::Exit);
                            break;
                        }
                    }
                }
                info!("{} endpoint stopped", endpoint.name());
            })
            .map_err(CommError::Spawn)?;

        Ok(Self { handle, stop, link })
    }

    /// Stop polling after the current round.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Request `EXIT` and stop polling.
    pub fn kill(&self) {
        self.link.request_mode(Mode::Exit);
        self.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the thread to end.
    pub fn join(self) -> Result<(), CommError> {
        self.handle.join().map_err(|_| CommError::Panicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GaitState, Roster, SharedContext};
    use gecko_common::pattern::PatternLibrary;
    use std::time::Duration;

    fn link() -> OperatorLink {
        let names = |n: usize| (0..n).map(|i| i.to_string()).collect::<Vec<_>>();
        let roster = Roster::new(names(8), names(8), names(4), names(2)).unwrap();
        let gait = GaitState::new(PatternLibrary::default(), "default", 3, false).unwrap();
        let shared = SharedContext::new(roster, Duration::from_millis(1), Mode::Pause, gait);
        OperatorLink::new(Arc::new(shared))
    }

    struct Counting {
        polls: u32,
        fail_at: Option<u32>,
        done_at: Option<u32>,
    }

    impl CommEndpoint for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn poll(&mut self, _link: &OperatorLink) -> Result<EndpointStatus, CommError> {
            self.polls += 1;
            if self.fail_at == Some(self.polls) {
                return Err(CommError::Script("broken".into()));
            }
            if self.done_at == Some(self.polls) {
                return Ok(EndpointStatus::Done);
            }
            Ok(EndpointStatus::Continue)
        }
    }

    #[test]
    fn failure_requests_exit() {
        let l = link();
        let ep = Counting { polls: 0, fail_at: Some(3), done_at: None };
        let t = CommThread::spawn(ep, l.clone()).unwrap();
        t.join().unwrap();
        assert_eq!(l.requested_mode(), Mode::Exit);
    }

    #[test]
    fn done_leaves_mode_alone() {
        let l = link();
        let ep = Counting { polls: 0, fail_at: None, done_at: Some(2) };
        CommThread::spawn(ep, l.clone()).unwrap().join().unwrap();
        assert_eq!(l.requested_mode(), Mode::Pause);
    }

    #[test]
    fn kill_requests_exit_and_stops() {
        let l = link();
        let ep = Counting { polls: 0, fail_at: None, done_at: None };
        let t = CommThread::spawn(ep, l.clone()).unwrap();
        t.kill();
        t.join().unwrap();
        assert_eq!(l.requested_mode(), Mode::Exit);
    }
}
