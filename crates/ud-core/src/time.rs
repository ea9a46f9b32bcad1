//! Sleeping on the monotonic clock

use std::io;
use std::time::Duration;
use tracing::trace;

/// Sleep for `duration` on `CLOCK_MONOTONIC`.
///
/// A sleep interrupted by a signal is resumed with the remaining time, so
/// wall-clock adjustments and stray signals never shorten it.
pub fn sleep_monotonic(duration: Duration) -> io::Result<()> {
    if duration.is_zero() {
        return Ok(());
    }
    trace!(secs = duration.as_secs(), nanos = duration.subsec_nanos(), "sleeping");

    let mut request = libc::timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    };
    loop {
        let mut remaining = libc::timespec { tv_sec: 0, tv_nsec: 0 };
        // SAFETY: both pointers refer to live stack values for the duration of the call.
        let rc = unsafe { libc::clock_nanosleep(libc::CLOCK_MONOTONIC, 0, &request, &mut remaining) };
        match rc {
            0 => return Ok(()),
            libc::EINTR => {
                trace!(secs = remaining.tv_sec, nanos = remaining.tv_nsec, "sleep interrupted, resuming");
                request = remaining;
            }
            err => return Err(io::Error::from_raw_os_error(err)),
        }
    }
}

/// Convert fractional seconds into a [`Duration`], clamping negatives to zero
/// and saturating values too large to represent.
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
