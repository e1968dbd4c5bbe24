/// Number of bursts currently transmitting, and whether the aggregate is in an off period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurstPopulation {
    active: u32,
    off_period: bool,
    peak: u32,
}

impl Default for BurstPopulation {
    fn default() -> Self {
        BurstPopulation {
            active: 0,
            off_period: true,
            peak: 0,
        }
    }
}

impl BurstPopulation {
    pub fn increment(&mut self) {
        self.active += 1;
        self.peak = self.peak.max(self.active);
    }

    /// Floored at zero: a departure without a matching arrival is ignored
    pub fn decrement(&mut self) {
        if self.active == 0 {
            log::warn!("Burst departure while no burst is active");
        }
        self.active = self.active.saturating_sub(1);
    }

    pub fn is_active(&self) -> bool {
        self.active > 0
    }

    pub fn active(&self) -> u32 {
        self.active
    }

    /// Highest number of simultaneous bursts since the last reset
    pub fn peak(&self) -> u32 {
        self.peak
    }

    pub fn is_off_period(&self) -> bool {
        self.off_period
    }

    pub fn set_off_period(&mut self, off: bool) {
        self.off_period = off;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let p = BurstPopulation::default();
        assert!(!p.is_active());
        assert!(p.is_off_period());
    }

    #[test]
    fn count_and_peak() {
        let mut p = BurstPopulation::default();
        p.increment();
        p.increment();
        p.decrement();
        assert_eq!(p.active(), 1);
        assert_eq!(p.peak(), 2);
        assert!(p.is_active());
    }

    #[test]
    fn floored_at_zero() {
        let mut p = BurstPopulation::default();
        p.decrement();
        p.decrement();
        assert_eq!(p.active(), 0);
        p.increment();
        assert_eq!(p.active(), 1);
    }
}
