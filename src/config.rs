use std::time::Duration;

use crate::timer::TIMER_DEC_PER_SECOND;

pub const DEFAULT_CPU_HZ: u32 = 540;

// Which register 8XY6 / 8XYE read before shifting
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ShiftSource {
    /// VX is shifted in place; VF takes the bit shifted out of VX.
    #[default]
    Vx,
    /// COSMAC VIP: VX = VY shifted, VF takes the bit shifted out of VY.
    Vy,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    pub shift_source: ShiftSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub cpu_hz: u32,
    pub timer_hz: u32,
    /// Sleep between polls of the clock; zero yields instead.
    pub poll_interval: Duration,
    /// Periods replayed after a stall before the clock is resynced.
    pub max_catch_up: u32,
    pub quirks: Quirks,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cpu_hz: DEFAULT_CPU_HZ,
            timer_hz: TIMER_DEC_PER_SECOND,
            poll_interval: Duration::from_millis(1),
            max_catch_up: 8,
            quirks: Quirks::default(),
        }
    }
}

impl Config {
    pub fn with_cpu_hz(mut self, hz: u32) -> Self {
        self.cpu_hz = hz.max(1);
        self
    }

    pub fn with_timer_hz(mut self, hz: u32) -> Self {
        self.timer_hz = hz.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_catch_up(mut self, periods: u32) -> Self {
        self.max_catch_up = periods.max(1);
        self
    }

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }

    pub fn cpu_period(&self) -> Duration {
        Duration::from_secs(1) / self.cpu_hz.max(1)
    }

    pub fn timer_period(&self) -> Duration {
        Duration::from_secs(1) / self.timer_hz.max(1)
    }
}
