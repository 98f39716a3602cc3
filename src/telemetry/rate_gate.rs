//! Skip-counter that decides whether a result is forwarded downstream.
//!
//! A gate fires when its countdown has gone negative, reloading it with the
//! configured skip. The owner decides when the countdown advances: the
//! control task ticks every pass, the fusion orchestrator only on fresh
//! estimates.

use crate::bus::PropertyTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateGate {
    skip: i64,
    count: i64,
}

impl RateGate {
    pub fn new(skip: i64) -> Self {
        Self { skip, count: 0 }
    }

    /// Gate whose skip interval is `attr` of the config node at `path`.
    pub fn from_config(tree: &PropertyTree, path: &str, attr: &str) -> Self {
        Self::new(tree.get_i64_at(path, attr))
    }

    /// Should this pass emit? Reloads the countdown when it does.
    #[inline]
    pub fn poll(&mut self) -> bool {
        if self.count < 0 {
            self.count = self.skip;
            true
        } else {
            false
        }
    }

    /// Advance the countdown by one.
    #[inline]
    pub fn tick(&mut self) {
        self.count -= 1;
    }

    pub fn skip(&self) -> i64 {
        self.skip
    }

    pub fn count(&self) -> i64 {
        self.count
    }
}

/// One gate per downstream consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GatePair {
    pub remote_link: RateGate,
    pub logging: RateGate,
}

impl GatePair {
    /// Read `key` from `/config/remote_link` and `/config/logging`.
    pub fn from_config(tree: &PropertyTree, key: &str) -> Self {
        Self {
            remote_link: RateGate::from_config(tree, "/config/remote_link", key),
            logging: RateGate::from_config(tree, "/config/logging", key),
        }
    }

    /// Poll both gates: `(send_remote_link, send_logging)`.
    #[inline]
    pub fn poll(&mut self) -> (bool, bool) {
        (self.remote_link.poll(), self.logging.poll())
    }

    #[inline]
    pub fn tick(&mut self) {
        self.remote_link.tick();
        self.logging.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(gate: &mut RateGate, ticks: usize) -> Vec<bool> {
        (0..ticks)
            .map(|_| {
                let fired = gate.poll();
                gate.tick();
                fired
            })
            .collect()
    }

    #[test]
    fn test_skip_one_fires_every_other_tick() {
        let mut gate = RateGate::new(1);
        assert_eq!(run(&mut gate, 5), vec![false, true, false, true, false]);
    }

    #[test]
    fn test_skip_zero_fires_every_tick_after_first() {
        let mut gate = RateGate::new(0);
        assert_eq!(run(&mut gate, 4), vec![false, true, true, true]);
    }

    #[test]
    fn test_poll_without_tick_never_refires() {
        let mut gate = RateGate::new(3);
        gate.tick();
        assert!(gate.poll());
        assert!(!gate.poll());
        assert_eq!(gate.count(), 3);
    }

    #[test]
    fn test_from_config() {
        let mut tree = PropertyTree::new();
        tree.set_at("/config/remote_link", "autopilot_skip", 9i64)
            .unwrap();
        let pair = GatePair::from_config(&tree, "autopilot_skip");
        assert_eq!(pair.remote_link.skip(), 9);
        assert_eq!(pair.logging.skip(), 0);
    }

    proptest! {
        #[test]
        fn prop_fires_once_per_period(skip in 0i64..20, periods in 1usize..10) {
            let mut gate = RateGate::new(skip);
            let period = (skip + 1) as usize;
            // first fire happens on the second tick
            let fired = run(&mut gate, 1 + period * periods);
            prop_assert_eq!(fired.iter().filter(|f| **f).count(), periods);
        }
    }
}
