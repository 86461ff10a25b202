use chrono::{Local, Timelike};

/// Source of the learner's local hour of day (0-23).
pub trait Clock: Send + Sync {
    fn hour(&self) -> u32;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn hour(&self) -> u32 {
        Local::now().hour()
    }
}

/// Always reports the same hour.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u32);

impl Clock for FixedClock {
    fn hour(&self) -> u32 {
        self.0 % 24
    }
}
