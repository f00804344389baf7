//! Sampling period pacing and RT setup.
//!
//! Every mode loop runs one iteration per sampling period: take a sample,
//! command the actuators, then sleep for whatever is left of the period.
//! A late iteration proceeds immediately; lost time is not made up.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity`: pin to an isolated CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`: RT priority.

use std::time::{Duration, Instant};

use crate::error::CycleError;

// ─── Loop Statistics ────────────────────────────────────────────────

/// O(1) per-iteration timing statistics.
///
/// Busy time is measured from the start of an iteration to the moment it
/// asks to sleep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopStats {
    /// Iterations executed.
    pub count: u64,
    /// Last busy time [ns].
    pub last_ns: u64,
    /// Minimum busy time [ns].
    pub min_ns: u64,
    /// Maximum busy time [ns].
    pub max_ns: u64,
    /// Running sum for the average.
    pub sum_ns: u64,
    /// Iterations that did not fit the period.
    pub overruns: u64,
}

impl LoopStats {
    /// Create a new zeroed stats instance.
    pub const fn new() -> Self {
        Self {
            count: 0,
            last_ns: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            sum_ns: 0,
            overruns: 0,
        }
    }

    /// Record one iteration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, busy_ns: u64, overrun: bool) {
        self.count += 1;
        self.last_ns = busy_ns;
        self.min_ns = self.min_ns.min(busy_ns);
        self.max_ns = self.max_ns.max(busy_ns);
        self.sum_ns = self.sum_ns.saturating_add(busy_ns);
        if overrun {
            self.overruns += 1;
        }
    }

    /// Average busy time [ns] (0 if nothing was recorded).
    #[inline]
    pub fn avg_ns(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.sum_ns / self.count
        }
    }
}

impl Default for LoopStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Pacer ──────────────────────────────────────────────────────────

/// Fixed-period pacing for one sampling loop.
#[derive(Debug, Clone)]
pub struct Pacer {
    period: Duration,
    started: Instant,
    stats: LoopStats,
}

impl Pacer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            started: Instant::now(),
            stats: LoopStats::new(),
        }
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[inline]
    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Take the statistics of the loop that just ended and start afresh.
    pub fn take_stats(&mut self) -> LoopStats {
        std::mem::take(&mut self.stats)
    }

    /// Mark the start of an iteration.
    #[inline]
    pub fn begin(&mut self) {
        self.started = Instant::now();
    }

    /// Sleep out the rest of the period started by [`Pacer::begin`].
    pub fn wait(&mut self) {
        let deadline = self.started + self.period;
        self.finish(deadline);
    }

    /// Like [`Pacer::wait`], but never sleep past `deadline`.
    pub fn wait_until(&mut self, deadline: Instant) {
        let period_end = self.started + self.period;
        self.finish(period_end.min(deadline));
    }

    fn finish(&mut self, wake: Instant) {
        let now = Instant::now();
        let busy = now.saturating_duration_since(self.started);
        let overrun = busy > self.period;
        self.stats
            .record(u64::try_from(busy.as_nanos()).unwrap_or(u64::MAX), overrun);
        if let Some(remaining) = wake.checked_duration_since(now) {
            sleep_for(remaining);
        }
    }
}

/// Sleep until `now + d` on `CLOCK_MONOTONIC`, resuming after signals.
#[cfg(feature = "rt")]
fn sleep_for(d: Duration) {
    use nix::errno::Errno;
    use nix::sys::time::TimeSpec;
    use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

    let clock = ClockId::CLOCK_MONOTONIC;
    let Ok(now) = clock_gettime(clock) else {
        std::thread::sleep(d);
        return;
    };
    let wake = now + TimeSpec::from_duration(d);
    let flags = ClockNanosleepFlags::TIMER_ABSTIME;
    while let Err(Errno::EINTR) = clock_nanosleep(clock, flags, &wake) {}
}

#[cfg(not(feature = "rt"))]
fn sleep_for(d: Duration) {
    std::thread::sleep(d);
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Lock all current and future memory pages.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch a large stack buffer so its pages are resident before the loop.
#[cfg(feature = "rt")]
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, aligned, exclusive reference.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(not(feature = "rt"))]
fn prefault_stack() {}

/// Pin the current thread to a specific CPU core.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

/// Set SCHED_FIFO with the given RT priority.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Perform the full RT setup sequence on the calling thread.
///
/// Must be called from the sampling thread before the dispatcher runs.
/// Without the `rt` feature every step is a no-op.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_lasts_the_full_duration() {
        let t0 = Instant::now();
        sleep_for(Duration::from_millis(20));
        assert!(t0.elapsed() >= Duration::from_millis(20));
    }

    #[cfg(feature = "rt")]
    #[test]
    fn signals_do_not_shorten_the_sleep() {
        use nix::sys::pthread::{pthread_kill, pthread_self};
        use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

        extern "C" fn ignore(_: libc::c_int) {}
        let action = SigAction::new(SigHandler::Handler(ignore), SaFlags::empty(), SigSet::empty());
        // SAFETY: the handler does nothing and is async-signal-safe.
        unsafe { sigaction(Signal::SIGUSR1, &action) }.unwrap();

        let sleeper = pthread_self();
        let kicker = std::thread::spawn(move || {
            for _ in 0..5 {
                std::thread::sleep(Duration::from_millis(5));
                let _ = pthread_kill(sleeper, Signal::SIGUSR1);
            }
        });
        let t0 = Instant::now();
        sleep_for(Duration::from_millis(50));
        let elapsed = t0.elapsed();
        kicker.join().unwrap();
        assert!(elapsed >= Duration::from_millis(50), "{elapsed:?}");
    }

    #[test]
    fn loop_stats_basic() {
        let mut stats = LoopStats::new();
        assert_eq!(stats.avg_ns(), 0);

        stats.record(500_000, false);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.min_ns, 500_000);
        assert_eq!(stats.max_ns, 500_000);

        stats.record(1_500_000, true);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min_ns, 500_000);
        assert_eq!(stats.max_ns, 1_500_000);
        assert_eq!(stats.avg_ns(), 1_000_000);
        assert_eq!(stats.overruns, 1);
    }

    #[test]
    fn wait_fills_the_period() {
        let period = Duration::from_millis(5);
        let mut pacer = Pacer::new(period);
        let t0 = Instant::now();
        for _ in 0..4 {
            pacer.begin();
            pacer.wait();
        }
        assert!(t0.elapsed() >= period * 4);
        assert_eq!(pacer.stats().count, 4);
    }

    #[test]
    fn overrun_proceeds_immediately() {
        let period = Duration::from_millis(2);
        let mut pacer = Pacer::new(period);
        pacer.begin();
        std::thread::sleep(Duration::from_millis(6));
        let before = Instant::now();
        pacer.wait();
        assert!(before.elapsed() < Duration::from_millis(2));
        assert_eq!(pacer.stats().overruns, 1);
    }

    #[test]
    fn wait_until_stops_at_deadline() {
        let mut pacer = Pacer::new(Duration::from_millis(50));
        pacer.begin();
        let deadline = Instant::now() + Duration::from_millis(5);
        pacer.wait_until(deadline);
        let late = Instant::now().saturating_duration_since(deadline);
        assert!(Instant::now() >= deadline);
        assert!(late < Duration::from_millis(40));
    }

    #[test]
    fn take_stats_resets() {
        let mut pacer = Pacer::new(Duration::from_micros(100));
        pacer.begin();
        pacer.wait();
        assert_eq!(pacer.take_stats().count, 1);
        assert_eq!(pacer.stats().count, 0);
    }

    #[test]
    fn rt_setup_no_rt_feature_is_noop() {
        #[cfg(not(feature = "rt"))]
        assert!(rt_setup(0, 80).is_ok());
    }
}
