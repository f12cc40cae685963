use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Sliding-window call budget: at most `max_calls` within any `window`.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_calls: usize,
    calls: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_calls: usize) -> Self {
        Self {
            window,
            max_calls,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Records a call if the budget allows it.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        Self::evict(&mut calls, now, self.window);
        if calls.len() >= self.max_calls {
            return false;
        }
        calls.push_back(now);
        true
    }

    pub fn remaining(&self) -> usize {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        Self::evict(&mut calls, Instant::now(), self.window);
        self.max_calls.saturating_sub(calls.len())
    }

    fn evict(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while calls
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= window)
        {
            calls.pop_front();
        }
    }
}
