use std::fmt;

/// Simulated minutes covered by one scheduling tick.
pub const TICK_MINUTES: u32 = 5;
/// Minutes per simulated hour.
pub const MINUTES_PER_HOUR: u32 = 60;
/// Hours per simulated day.
pub const HOURS_PER_DAY: u32 = 24;
/// Ticks per simulated day (`24 * 60 / 5`).
pub const TICKS_PER_DAY: u32 = HOURS_PER_DAY * MINUTES_PER_HOUR / TICK_MINUTES;

/// Read-only snapshot of the simulation clock.
///
/// Collaborators receive this instead of the clock itself, so nothing
/// outside the driver can move simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockState {
    /// Minute within the hour, `0..60`.
    pub minute: u32,
    /// Hour within the day, `0..24`.
    pub hour: u32,
    /// Simulated day, starting at 1.
    pub day: u32,
}

impl ClockState {
    /// Index of the 5-minute interval within the day: `hour * 12 + minute / 5`.
    pub fn interval_index(&self) -> u32 {
        self.hour * (MINUTES_PER_HOUR / TICK_MINUTES) + self.minute / TICK_MINUTES
    }

    /// Simulated seconds elapsed since midnight of day 1. Day 0 is treated
    /// as day 1.
    pub fn elapsed_secs(&self) -> u64 {
        u64::from(self.day.saturating_sub(1)) * 86_400
            + u64::from(self.hour) * 3_600
            + u64::from(self.minute) * 60
    }

    /// Whether this is the first tick of a day.
    pub fn is_day_start(&self) -> bool {
        self.hour == 0 && self.minute == 0
    }
}

impl fmt::Display for ClockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "day {} {:02}:{:02} (interval {})",
            self.day,
            self.hour,
            self.minute,
            self.interval_index()
        )
    }
}

/// Wall of simulated time for the whole run.
///
/// The clock moves in fixed 5-minute ticks. Minutes wrap into hours and
/// hours wrap into days; days only ever increase.
///
/// # Examples
///
/// ```
/// use wpm_cosim::sim::clock::SimulationClock;
///
/// let mut clock = SimulationClock::new();
/// for _ in 0..12 {
///     clock.advance();
/// }
/// assert_eq!(clock.hour(), 1);
/// assert_eq!(clock.minute(), 0);
/// assert_eq!(clock.interval_index(), 12);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationClock {
    minute: u32,
    hour: u32,
    day: u32,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationClock {
    /// Creates a clock at midnight of day 1.
    pub fn new() -> Self {
        Self {
            minute: 0,
            hour: 0,
            day: 1,
        }
    }

    /// Creates a clock at an arbitrary instant.
    ///
    /// # Panics
    ///
    /// Panics if `day` is zero, `hour >= 24`, or `minute` is not a
    /// 5-minute mark below 60.
    pub fn starting_at(day: u32, hour: u32, minute: u32) -> Self {
        assert!(day >= 1, "day must be >= 1");
        assert!(hour < HOURS_PER_DAY, "hour must be < 24");
        assert!(
            minute < MINUTES_PER_HOUR && minute % TICK_MINUTES == 0,
            "minute must be a 5-minute mark below 60"
        );
        Self { minute, hour, day }
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// Current interval index (`hour * 12 + minute / 5`).
    pub fn interval_index(&self) -> u32 {
        self.state().interval_index()
    }

    /// Snapshot of the current instant.
    pub fn state(&self) -> ClockState {
        ClockState {
            minute: self.minute,
            hour: self.hour,
            day: self.day,
        }
    }

    /// Advances the clock by one tick.
    ///
    /// # Returns
    ///
    /// `true` if this tick rolled the clock over into a new day.
    pub fn advance(&mut self) -> bool {
        self.minute += TICK_MINUTES;
        if self.minute < MINUTES_PER_HOUR {
            return false;
        }
        self.minute = 0;
        self.hour += 1;
        if self.hour < HOURS_PER_DAY {
            return false;
        }
        self.hour = 0;
        self.day += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clock_starts_at_day_one_midnight() {
        let clock = SimulationClock::new();
        assert_eq!(clock.state(), ClockState { minute: 0, hour: 0, day: 1 });
        assert_eq!(clock.interval_index(), 0);
    }

    #[test]
    fn advance_moves_five_minutes() {
        let mut clock = SimulationClock::new();
        assert!(!clock.advance());
        assert_eq!(clock.minute(), 5);
        assert_eq!(clock.interval_index(), 1);
    }

    #[test]
    fn hour_rolls_after_twelve_ticks() {
        let mut clock = SimulationClock::starting_at(3, 6, 55);
        clock.advance();
        assert_eq!((clock.day(), clock.hour(), clock.minute()), (3, 7, 0));
    }

    #[test]
    fn full_day_rolls_to_next_midnight() {
        let mut clock = SimulationClock::starting_at(4, 0, 0);
        let mut rollovers = 0;
        for _ in 0..TICKS_PER_DAY {
            if clock.advance() {
                rollovers += 1;
            }
        }
        assert_eq!(TICKS_PER_DAY, 288);
        assert_eq!(rollovers, 1);
        assert_eq!(clock.state(), ClockState { minute: 0, hour: 0, day: 5 });
    }

    #[test]
    fn ranges_hold_over_many_days() {
        let mut clock = SimulationClock::new();
        let mut last_day = clock.day();
        for _ in 0..(TICKS_PER_DAY * 3 + 17) {
            clock.advance();
            assert!(clock.minute() < 60);
            assert!(clock.hour() < 24);
            assert!(clock.day() >= last_day);
            last_day = clock.day();
        }
        assert_eq!(clock.day(), 4);
    }

    #[test]
    fn last_interval_of_day_is_287() {
        let clock = SimulationClock::starting_at(1, 23, 55);
        assert_eq!(clock.interval_index(), 287);
    }

    #[test]
    fn elapsed_secs_counts_from_day_one() {
        let state = ClockState { minute: 5, hour: 1, day: 2 };
        assert_eq!(state.elapsed_secs(), 86_400 + 3_600 + 300);
    }

    #[test]
    fn day_zero_counts_as_day_one() {
        let state = ClockState { minute: 10, hour: 2, day: 0 };
        assert_eq!(state.elapsed_secs(), 7_800);
        assert_eq!(
            crate::sim::sync::TimeBarrier::post_clearing(&state).at_secs,
            7_800
        );
    }

    #[test]
    #[should_panic]
    fn off_grid_minute_panics() {
        SimulationClock::starting_at(1, 0, 7);
    }
}
