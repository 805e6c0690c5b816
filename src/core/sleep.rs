use crate::core::config::FreezeThresholds;
use crate::{PhysicsError, Result};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// One bucket of the sleep table
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SleepEntry {
    /// Squared linear acceleration ceiling
    pub max_accel2: f32,

    /// Squared angular acceleration ceiling
    pub max_alpha2: f32,

    /// Squared linear speed ceiling
    pub max_veloc2: f32,

    /// Squared angular speed ceiling
    pub max_omega2: f32,

    /// Consecutive steps an island must stay under the ceilings
    pub steps: u32,
}

impl SleepEntry {
    /// Whether all four motion maxima fit under this bucket's ceilings
    #[inline]
    pub fn contains(&self, accel2: f32, alpha2: f32, veloc2: f32, omega2: f32) -> bool {
        accel2 <= self.max_accel2
            && alpha2 <= self.max_alpha2
            && veloc2 <= self.max_veloc2
            && omega2 <= self.max_omega2
    }
}

/// Ordered thresholds deciding when a resting island may be frozen.
///
/// Buckets escalate geometrically from the freeze thresholds: the quieter
/// an island is, the fewer consecutive steps it needs before sleeping.
/// The final bucket is a far looser "deep sleep" catch-all with the
/// longest step requirement.
#[derive(Debug, Clone)]
pub struct SleepTable {
    entries: [SleepEntry; SleepTable::ENTRY_COUNT],
}

impl SleepTable {
    /// Number of buckets
    pub const ENTRY_COUNT: usize = 8;

    /// Builds the default table from the world's freeze thresholds
    pub fn new(freeze: &FreezeThresholds) -> Self {
        let mut entries = [SleepEntry::default(); Self::ENTRY_COUNT];

        let mut accel2 = freeze.accel2 * 0.009;
        let mut alpha2 = freeze.alpha2 * 0.009;
        let mut veloc2 = freeze.speed2 * 0.25;
        let mut omega2 = freeze.omega2 * 0.1;
        let mut steps = 1;
        for entry in entries.iter_mut() {
            *entry = SleepEntry {
                max_accel2: accel2,
                max_alpha2: alpha2,
                max_veloc2: veloc2,
                max_omega2: omega2,
                steps,
            };
            steps += 7;
            accel2 *= 1.5;
            alpha2 *= 1.5;
            veloc2 *= 1.5;
            omega2 *= 1.5;
        }

        // The last bucket is the deep-sleep catch-all.
        let last = &mut entries[Self::ENTRY_COUNT - 1];
        last.max_accel2 *= 100.0;
        last.max_alpha2 *= 100.0;
        last.max_veloc2 *= 100.0;
        last.max_omega2 *= 100.0;

        Self { entries }
    }

    /// Returns a bucket
    pub fn get_sleep_entry(&self, index: usize) -> Result<SleepEntry> {
        self.entries
            .get(index)
            .copied()
            .ok_or_else(|| {
                PhysicsError::InvalidParameter(format!("sleep table index {} out of range", index))
            })
    }

    /// Overrides a bucket
    pub fn set_sleep_entry(&mut self, index: usize, entry: SleepEntry) -> Result<()> {
        match self.entries.get_mut(index) {
            Some(slot) => {
                *slot = entry;
                Ok(())
            }
            None => Err(PhysicsError::InvalidParameter(format!(
                "sleep table index {} out of range",
                index
            ))),
        }
    }

    /// Finds the first bucket whose ceilings contain the given maxima
    pub fn find_bucket(&self, accel2: f32, alpha2: f32, veloc2: f32, omega2: f32) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.contains(accel2, alpha2, veloc2, omega2))
    }

    /// Steps required by a bucket
    pub fn required_steps(&self, bucket: usize) -> u32 {
        self.entries[bucket.min(Self::ENTRY_COUNT - 1)].steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_escalate() {
        let table = SleepTable::new(&FreezeThresholds::default());
        for i in 1..SleepTable::ENTRY_COUNT {
            let prev = table.get_sleep_entry(i - 1).unwrap();
            let next = table.get_sleep_entry(i).unwrap();
            assert!(next.max_veloc2 > prev.max_veloc2);
            assert!(next.steps > prev.steps);
        }
    }

    #[test]
    fn test_find_bucket_prefers_tightest() {
        let table = SleepTable::new(&FreezeThresholds::default());
        assert_eq!(table.find_bucket(0.0, 0.0, 0.0, 0.0), Some(0));
        assert_eq!(table.find_bucket(1.0e9, 0.0, 0.0, 0.0), None);
    }

    #[test]
    fn test_override_entry() {
        let mut table = SleepTable::new(&FreezeThresholds::default());
        let entry = SleepEntry {
            max_accel2: 1.0,
            max_alpha2: 1.0,
            max_veloc2: 1.0,
            max_omega2: 1.0,
            steps: 3,
        };
        table.set_sleep_entry(0, entry).unwrap();
        assert_eq!(table.get_sleep_entry(0).unwrap(), entry);
        assert!(table.set_sleep_entry(99, entry).is_err());
    }
}
