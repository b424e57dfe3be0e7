//! Iteration-bounded busy polling.

use embedded_hal::delay::DelayNs;

/// Outcome of a bounded poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Readiness {
    /// The condition held on attempt `attempts` (1-based)
    Ready { attempts: u32 },
    /// The ceiling was reached without the condition holding
    NotReady { attempts: u32 },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Polls a condition up to `max_attempts` times, sleeping `delay_ns`
/// between attempts. Latency is bounded by the attempt count, not a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadyPoll {
    pub max_attempts: u32,
    pub delay_ns: u32,
}

impl Default for ReadyPoll {
    fn default() -> Self {
        Self {
            max_attempts: 400_000,
            delay_ns: 0,
        }
    }
}

impl ReadyPoll {
    pub const fn new(max_attempts: u32, delay_ns: u32) -> Self {
        Self {
            max_attempts,
            delay_ns,
        }
    }

    pub fn poll<E>(
        &self,
        delay: &mut impl DelayNs,
        mut condition: impl FnMut() -> Result<bool, E>,
    ) -> Result<Readiness, E> {
        for attempt in 1..=self.max_attempts {
            if condition()? {
                return Ok(Readiness::Ready { attempts: attempt });
            }
            if self.delay_ns > 0 && attempt < self.max_attempts {
                delay.delay_ns(self.delay_ns);
            }
        }

        Ok(Readiness::NotReady {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use embedded_hal_mock::eh1::delay::NoopDelay;

    use super::*;

    #[test]
    fn ready_on_third_attempt() {
        let mut remaining = 2;
        let readiness = ReadyPoll::new(10, 0)
            .poll::<Infallible>(&mut NoopDelay::new(), || {
                if remaining == 0 {
                    return Ok(true);
                }
                remaining -= 1;
                Ok(false)
            })
            .unwrap();

        assert_eq!(readiness, Readiness::Ready { attempts: 3 });
    }

    #[test]
    fn ceiling_is_exact() {
        let mut calls = 0;
        let readiness = ReadyPoll::new(5, 100)
            .poll::<Infallible>(&mut NoopDelay::new(), || {
                calls += 1;
                Ok(false)
            })
            .unwrap();

        assert_eq!(readiness, Readiness::NotReady { attempts: 5 });
        assert!(!readiness.is_ready());
        assert_eq!(calls, 5);
    }

    #[test]
    fn condition_errors_propagate() {
        let result = ReadyPoll::default().poll(&mut NoopDelay::new(), || Err::<bool, _>("pin"));
        assert_eq!(result, Err("pin"));
    }
}
