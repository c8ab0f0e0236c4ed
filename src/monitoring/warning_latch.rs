/// Edge-triggered warning state.
///
/// `warning_sent` follows the hazard condition and is reset as soon as the
/// hazard goes away. `pending_warning` is a latch only the consumer clears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarningLatch {
    pending_warning: bool,
    warning_sent: bool,
}

impl WarningLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a hazardous tick. Returns `true` when it starts a new episode,
    /// in which case a warning is raised.
    pub fn hazard_present(&mut self) -> bool {
        if self.warning_sent {
            return false;
        }
        self.warning_sent = true;
        self.pending_warning = true;
        true
    }

    /// Records a clear tick; the next hazard starts a new episode.
    pub fn hazard_cleared(&mut self) {
        self.warning_sent = false;
    }

    /// Sets the pending latch without touching the episode state.
    pub fn raise_pending(&mut self) {
        self.pending_warning = true;
    }

    pub fn has_pending(&self) -> bool {
        self.pending_warning
    }

    pub fn clear_pending(&mut self) {
        self.pending_warning = false;
    }

    pub fn warning_sent(&self) -> bool {
        self.warning_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(latch: &mut WarningLatch, ticks: &[bool]) -> Vec<bool> {
        ticks
            .iter()
            .map(|&hazard| {
                if hazard {
                    latch.hazard_present()
                } else {
                    latch.hazard_cleared();
                    false
                }
            })
            .collect()
    }

    #[test]
    fn one_raise_per_episode() {
        let mut latch = WarningLatch::new();
        let raised = run(&mut latch, &[true, true, true, false, true]);
        assert_eq!(raised, vec![true, false, false, false, true]);
    }

    #[test]
    fn pending_survives_end_of_episode() {
        let mut latch = WarningLatch::new();
        latch.hazard_present();
        latch.hazard_cleared();
        assert!(!latch.warning_sent());
        assert!(latch.has_pending());

        latch.clear_pending();
        assert!(!latch.has_pending());
    }

    #[test]
    fn clearing_mid_episode_does_not_re_raise() {
        let mut latch = WarningLatch::new();
        latch.hazard_present();
        latch.clear_pending();
        assert!(!latch.hazard_present());
        assert!(!latch.has_pending());
    }
}
