//! Blocking delay abstraction.
//!
//! The device port needs a handful of fixed-duration sleeps (PLL
//! reset settle time, calibration wait, SPI busy-poll backoff) that
//! must not spin-wait the CPU. [`Sleeper`] is the seam: production
//! code drives [`NanoSleeper`], tests drive a counting fake that
//! returns instantly so the test suite doesn't spend real wall-clock
//! time walking through 500 ms PLL lock retries.

use std::time::Duration;

/// Something that can block the calling thread for at least `d`.
pub trait Sleeper {
    fn sleep_at_least(&self, d: Duration);
}

/// Production sleeper backed by `std::thread::sleep`.
///
/// `std::thread::sleep` already restarts on spurious wakeup on every
/// platform Rust supports, mirroring the reference driver's
/// `us_sleep()` (`while (nanosleep(&t, &rem) && EINTR == errno) t =
/// rem;`) without needing to hand-roll the retry loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct NanoSleeper;

impl Sleeper for NanoSleeper {
    fn sleep_at_least(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::cell::RefCell;

    /// Records requested sleep durations instead of blocking, so unit
    /// tests covering PLL setup or clock-mode detection run instantly.
    #[derive(Debug, Default)]
    pub struct FakeSleeper {
        pub calls: RefCell<Vec<Duration>>,
    }

    impl Sleeper for FakeSleeper {
        fn sleep_at_least(&self, d: Duration) {
            self.calls.borrow_mut().push(d);
        }
    }

    impl FakeSleeper {
        pub fn total(&self) -> Duration {
            self.calls.borrow().iter().sum()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeSleeper;
    use super::*;

    #[test]
    fn fake_sleeper_records_calls_without_blocking() {
        let sleeper = FakeSleeper::default();
        sleeper.sleep_at_least(Duration::from_millis(500));
        sleeper.sleep_at_least(Duration::from_millis(20));
        assert_eq!(sleeper.total(), Duration::from_millis(520));
    }
}
