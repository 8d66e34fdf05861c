use std::time::{Duration, Instant};

/// Fixed-period timer driving the self-healing check. A zero period
/// disables it.
#[derive(Debug, Clone)]
pub struct HealingMonitor {
    period: Duration,
    next_tick: Option<Instant>,
    repairs: u64,
}

impl HealingMonitor {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_tick: None,
            repairs: 0,
        }
    }

    pub fn start(&mut self, now: Instant) {
        if !self.period.is_zero() {
            self.next_tick = Some(now + self.period);
        }
    }

    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_tick
    }

    /// True when a tick is due. Missed ticks are not replayed.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.next_tick {
            Some(tick) if tick <= now => {
                self.next_tick = Some(now + self.period);
                true
            }
            _ => false,
        }
    }

    pub fn record_repair(&mut self) {
        self.repairs += 1;
    }

    pub fn repairs(&self) -> u64 {
        self.repairs
    }
}
