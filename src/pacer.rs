/*
 *  pacer.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Sleep and clock seam, refresh deadline
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveTime};

/// Every timed wait in the crate goes through here, so tests can run the
/// whole animation without sleeping.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);

    fn now(&self) -> Instant;

    /// Wall clock time of day, for the dimming window
    fn local_time(&self) -> NaiveTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn local_time(&self) -> NaiveTime {
        Local::now().time()
    }
}

#[derive(Debug)]
struct VirtualClock {
    origin: Instant,
    elapsed: Duration,
    time_of_day: NaiveTime,
    sleeps: Vec<Duration>,
}

/// Virtual clock: `sleep` records the request and advances time instantly.
/// Clones share the same clock.
#[derive(Debug, Clone)]
pub struct RecordingSleeper {
    clock: Arc<Mutex<VirtualClock>>,
}

impl RecordingSleeper {
    pub fn new(time_of_day: NaiveTime) -> Self {
        Self {
            clock: Arc::new(Mutex::new(VirtualClock {
                origin: Instant::now(),
                elapsed: Duration::ZERO,
                time_of_day,
                sleeps: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VirtualClock> {
        self.clock.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Every requested sleep, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.lock().elapsed
    }
}

impl Default for RecordingSleeper {
    fn default() -> Self {
        Self::new(NaiveTime::MIN)
    }
}

impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        {
            let mut c = self.lock();
            c.elapsed += duration;
            c.sleeps.push(duration);
            let step = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
            c.time_of_day = c.time_of_day.overflowing_add_signed(step).0;
        }
        // let select! and timeouts observe the task
        tokio::task::yield_now().await;
    }

    fn now(&self) -> Instant {
        let c = self.lock();
        c.origin + c.elapsed
    }

    fn local_time(&self) -> NaiveTime {
        self.lock().time_of_day
    }
}

/// Deadline for the next weather refresh, independent of the phase loop
#[derive(Debug, Clone)]
pub struct RefreshTimer {
    next_deadline: Instant,
    interval: Duration,
}

impl RefreshTimer {
    pub fn start(now: Instant, interval: Duration) -> Self {
        Self { next_deadline: now + interval, interval }
    }

    #[inline]
    pub fn expired(&self, now: Instant) -> bool {
        now >= self.next_deadline
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_deadline.saturating_duration_since(now)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_sleeper_advances_clock() {
        let s = RecordingSleeper::new(NaiveTime::from_hms_opt(23, 59, 0).unwrap());
        let t0 = s.now();
        s.sleep(Duration::from_secs(90)).await;
        s.sleep(Duration::from_millis(500)).await;
        assert_eq!(s.sleeps(), vec![Duration::from_secs(90), Duration::from_millis(500)]);
        assert_eq!(s.now() - t0, Duration::from_millis(90_500));
        // wraps past midnight
        assert_eq!(s.local_time(), NaiveTime::from_hms_milli_opt(0, 0, 30, 500).unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_the_clock() {
        let a = RecordingSleeper::default();
        let b = a.clone();
        b.sleep(Duration::from_secs(1)).await;
        assert_eq!(a.total_slept(), Duration::from_secs(1));
    }

    #[test]
    fn test_refresh_timer() {
        let t0 = Instant::now();
        let timer = RefreshTimer::start(t0, Duration::from_secs(300));
        assert!(!timer.expired(t0 + Duration::from_secs(299)));
        assert!(timer.expired(t0 + Duration::from_secs(300)));
        assert_eq!(timer.remaining(t0 + Duration::from_secs(100)), Duration::from_secs(200));
        assert_eq!(timer.remaining(t0 + Duration::from_secs(400)), Duration::ZERO);
    }
}
