//! Process-unique identifiers for group members
//!
//! A guid is `<hostname>-<pid>-<unix_seconds>-<counter>`. The counter is a
//! process-wide monotonic 32-bit value wrapping to 1 at `0x7FFF_FFFF`, so
//! every call within one process yields a distinct string; across processes
//! the pid and timestamp make collisions negligible.

use std::process;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Counter wrap point; the value after it is 1.
const COUNTER_WRAP: u32 = 0x7FFF_FFFF;

/// Monotonic 32-bit counter wrapping to 1 at [`COUNTER_WRAP`].
pub(crate) struct MonotonicCounter(AtomicU32);

impl MonotonicCounter {
    pub(crate) const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Next counter value, distinct per call within one wrap period.
    pub(crate) fn next(&self) -> u32 {
        loop {
            let prev = self.0.load(Ordering::Relaxed);
            let next = if prev >= COUNTER_WRAP { 1 } else { prev + 1 };
            if self
                .0
                .compare_exchange_weak(prev, next, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                return next;
            }
        }
    }
}

static COUNTER: MonotonicCounter = MonotonicCounter::new();
static HOSTNAME: OnceLock<String> = OnceLock::new();

#[cfg(target_os = "linux")]
fn read_hostname() -> String {
    std::fs::read_to_string("/etc/hostname")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(not(target_os = "linux"))]
fn read_hostname() -> String {
    "unknown".to_string()
}

fn hostname() -> &'static str {
    HOSTNAME.get_or_init(read_hostname)
}

/// Generate a process-unique guid.
pub fn generate() -> String {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!(
        "{}-{}-{}-{}",
        hostname(),
        process::id(),
        seconds,
        COUNTER.next()
    )
}
