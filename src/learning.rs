//! Learning collaborator seam: convergence flags for stopping rules 2 to 5.

use log::debug;
use rand::{SeedableRng, rngs::StdRng};

use crate::config::{CheckWindow, StoppingConfig};
use crate::noise::gaussian_noise;

/// Sizes of a GenCo's action-domain grid.
///
/// A GenCo whose three grid sizes are all 1 has exactly one action and
/// therefore nothing to learn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDomainShape {
    pub lower_ri_count: u32,
    pub upper_ri_count: u32,
    pub upper_cap_count: u32,
}

impl ActionDomainShape {
    pub fn new(lower_ri_count: u32, upper_ri_count: u32, upper_cap_count: u32) -> Self {
        Self {
            lower_ri_count,
            upper_ri_count,
            upper_cap_count,
        }
    }

    /// Number of actions in the domain.
    pub fn action_count(&self) -> u64 {
        u64::from(self.lower_ri_count)
            * u64::from(self.upper_ri_count)
            * u64::from(self.upper_cap_count)
    }

    pub fn is_single_action(&self) -> bool {
        self.lower_ri_count == 1 && self.upper_ri_count == 1 && self.upper_cap_count == 1
    }
}

/// Convergence flags reported by the learning collaborator.
///
/// `None` means the collaborator supplied nothing for that criterion; the
/// corresponding stopping rule then never fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvergenceFlags {
    /// Every GenCo picks a single action with the threshold probability.
    pub threshold_probability: Option<bool>,
    /// Action-probability differences stayed under threshold for the window.
    pub action_probability: Option<bool>,
    /// Learning-result differences stayed under threshold for the window.
    pub learning_result: Option<bool>,
    /// Daily net earning changes stayed under threshold for the window.
    pub daily_net_earning: Option<bool>,
}

/// External learning component consulted by the tick driver.
pub trait LearningCollaborator {
    /// Folds the outcome of a completed simulated day into the learners.
    fn end_of_day(&mut self, day: u32);

    /// Current convergence flags.
    fn convergence(&self) -> ConvergenceFlags;
}

/// Collaborator that always reports the same flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedFlags(pub ConvergenceFlags);

impl LearningCollaborator for FixedFlags {
    fn end_of_day(&mut self, _day: u32) {}

    fn convergence(&self) -> ConvergenceFlags {
        self.0
    }
}

/// Consecutive-day check: converged once a daily difference stays under
/// the threshold for `day_length` days in a row, counting from `start_day`.
#[derive(Debug, Clone)]
pub struct WindowCheck {
    window: CheckWindow,
    streak: u32,
}

impl WindowCheck {
    pub fn new(window: CheckWindow) -> Self {
        Self { window, streak: 0 }
    }

    /// Records the difference observed for `day` and reports convergence.
    pub fn observe(&mut self, day: u32, difference: f64) -> bool {
        if day < self.window.start_day {
            return false;
        }
        if difference.abs() < self.window.threshold {
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        self.is_converged()
    }

    pub fn is_converged(&self) -> bool {
        self.streak >= self.window.day_length
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }
}

#[derive(Debug, Clone)]
struct GenCoLearner {
    shape: ActionDomainShape,
    action_probability: Option<WindowCheck>,
    learning_result: Option<WindowCheck>,
    daily_net_earning: Option<WindowCheck>,
    best_action_probability: f64,
}

/// Seeded stand-in for the reinforcement learners.
///
/// Each GenCo's day-over-day differences shrink geometrically with noise,
/// so the windowed checks eventually converge. Single-action GenCos are
/// converged from the start.
#[derive(Debug, Clone)]
pub struct SeededLearner {
    learners: Vec<GenCoLearner>,
    threshold_probability: Option<f64>,
    decay: f64,
    rng: StdRng,
}

impl SeededLearner {
    /// Daily shrink factor of the simulated differences.
    pub const DEFAULT_DECAY: f64 = 0.6;

    pub fn new(shapes: &[ActionDomainShape], stopping: &StoppingConfig, seed: u64) -> Self {
        let learners = shapes
            .iter()
            .map(|&shape| GenCoLearner {
                shape,
                action_probability: stopping.action_probability.map(WindowCheck::new),
                learning_result: stopping.learning_result.map(WindowCheck::new),
                daily_net_earning: stopping.daily_net_earning.map(WindowCheck::new),
                best_action_probability: if shape.is_single_action() {
                    1.0
                } else {
                    1.0 / shape.action_count() as f64
                },
            })
            .collect();
        Self {
            learners,
            threshold_probability: stopping.threshold_probability,
            decay: Self::DEFAULT_DECAY,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay.clamp(0.0, 1.0);
        self
    }

    fn all_converged(&self, pick: impl Fn(&GenCoLearner) -> Option<&WindowCheck>) -> Option<bool> {
        let mut any = false;
        let mut all = true;
        for learner in &self.learners {
            if let Some(check) = pick(learner) {
                any = true;
                all &= learner.shape.is_single_action() || check.is_converged();
            }
        }
        any.then_some(all)
    }
}

impl LearningCollaborator for SeededLearner {
    fn end_of_day(&mut self, day: u32) {
        let scale = self.decay.powi(day as i32);
        for learner in &mut self.learners {
            let prob_diff = gaussian_noise(&mut self.rng, 0.05) * scale;
            let result_diff = gaussian_noise(&mut self.rng, 5.0) * scale;
            let earning_diff = gaussian_noise(&mut self.rng, 500.0) * scale;

            if let Some(check) = learner.action_probability.as_mut() {
                check.observe(day, prob_diff);
            }
            if let Some(check) = learner.learning_result.as_mut() {
                check.observe(day, result_diff);
            }
            if let Some(check) = learner.daily_net_earning.as_mut() {
                check.observe(day, earning_diff);
            }
            if !learner.shape.is_single_action() {
                let gap = 1.0 - learner.best_action_probability;
                learner.best_action_probability = 1.0 - gap * self.decay;
            }
        }
        debug!("learners folded day {day}");
    }

    fn convergence(&self) -> ConvergenceFlags {
        let threshold_probability = self.threshold_probability.map(|p| {
            self.learners
                .iter()
                .all(|l| l.best_action_probability >= p)
        });
        ConvergenceFlags {
            threshold_probability,
            action_probability: self.all_converged(|l| l.action_probability.as_ref()),
            learning_result: self.all_converged(|l| l.learning_result.as_ref()),
            daily_net_earning: self.all_converged(|l| l.daily_net_earning.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start_day: u32, day_length: u32, threshold: f64) -> CheckWindow {
        CheckWindow {
            start_day,
            day_length,
            threshold,
        }
    }

    #[test]
    fn single_action_shape() {
        assert!(ActionDomainShape::new(1, 1, 1).is_single_action());
        assert!(!ActionDomainShape::new(1, 2, 1).is_single_action());
        assert_eq!(ActionDomainShape::new(10, 10, 2).action_count(), 200);
    }

    #[test]
    fn window_ignores_days_before_start() {
        let mut check = WindowCheck::new(window(3, 2, 1.0));
        assert!(!check.observe(1, 0.0));
        assert!(!check.observe(2, 0.0));
        assert_eq!(check.streak(), 0);
        assert!(!check.observe(3, 0.0));
        assert!(check.observe(4, 0.0));
    }

    #[test]
    fn window_resets_on_large_difference() {
        let mut check = WindowCheck::new(window(1, 3, 0.5));
        check.observe(1, 0.1);
        check.observe(2, 0.1);
        assert!(!check.observe(3, 0.9));
        assert_eq!(check.streak(), 0);
        check.observe(4, -0.2);
        check.observe(5, 0.0);
        assert!(check.observe(6, 0.4));
    }

    #[test]
    fn unreported_criteria_are_none() {
        let stopping = StoppingConfig {
            max_day: Some(5),
            ..StoppingConfig::default()
        };
        let learner = SeededLearner::new(&[ActionDomainShape::new(10, 10, 1)], &stopping, 1);
        assert_eq!(learner.convergence(), ConvergenceFlags::default());
    }

    #[test]
    fn seeded_learner_eventually_converges() {
        let stopping = StoppingConfig {
            max_day: Some(60),
            threshold_probability: Some(0.99),
            action_probability: Some(window(2, 3, 0.001)),
            learning_result: Some(window(2, 3, 0.5)),
            daily_net_earning: Some(window(2, 3, 25.0)),
        };
        let shapes = [ActionDomainShape::new(10, 10, 1), ActionDomainShape::new(5, 5, 1)];
        let mut learner = SeededLearner::new(&shapes, &stopping, 42);
        assert_eq!(learner.convergence().action_probability, Some(false));

        for day in 1..=40 {
            learner.end_of_day(day);
        }
        let flags = learner.convergence();
        assert_eq!(flags.threshold_probability, Some(true));
        assert_eq!(flags.action_probability, Some(true));
        assert_eq!(flags.learning_result, Some(true));
        assert_eq!(flags.daily_net_earning, Some(true));
    }

    #[test]
    fn single_action_gencos_count_as_converged() {
        let stopping = StoppingConfig {
            learning_result: Some(window(1, 5, 0.0)),
            ..StoppingConfig::default()
        };
        let learner = SeededLearner::new(&[ActionDomainShape::new(1, 1, 1)], &stopping, 3);
        assert_eq!(learner.convergence().learning_result, Some(true));
    }
}
