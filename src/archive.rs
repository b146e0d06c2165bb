//! Per-day archive of day-ahead clearing results.

/// Day-ahead LMPs of one simulated day, indexed `[hour][node]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    pub day: u32,
    pub day_ahead_lmp: Vec<Vec<f64>>,
}

/// Append-only store of per-day results.
///
/// Appending copies the caller's matrix; later changes to the source
/// buffer never show up in archived days.
///
/// # Examples
///
/// ```
/// use wpm_cosim::archive::DailyArchive;
///
/// let mut prices = vec![vec![20.0, 21.0]; 24];
/// let mut archive = DailyArchive::new();
/// archive.append(1, &prices);
/// prices[0][0] = 99.0;
/// assert_eq!(archive.day(1).map(|d| d.day_ahead_lmp[0][0]), Some(20.0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DailyArchive {
    days: Vec<DayRecord>,
}

impl DailyArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a copy of `day_ahead_lmp` for `day`, replacing an earlier
    /// entry for the same day.
    pub fn append(&mut self, day: u32, day_ahead_lmp: &[Vec<f64>]) {
        let record = DayRecord {
            day,
            day_ahead_lmp: day_ahead_lmp.to_vec(),
        };
        match self.days.iter_mut().find(|d| d.day == day) {
            Some(existing) => *existing = record,
            None => self.days.push(record),
        }
    }

    pub fn day(&self, day: u32) -> Option<&DayRecord> {
        self.days.iter().find(|d| d.day == day)
    }

    pub fn days(&self) -> &[DayRecord] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
