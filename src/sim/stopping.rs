//! Composite stopping rules and their run-ending explanation.

use std::fmt;

use log::{debug, info};

use crate::config::{CheckWindow, StoppingConfig};
use crate::learning::{ActionDomainShape, ConvergenceFlags};

use super::clock::ClockState;

/// Last hour of a simulated day; rule 1 fires during it.
const LAST_HOUR: u32 = 23;

/// The five independent stopping criteria, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Rule 1: the configured maximum day has reached its last hour.
    MaxDay,
    /// Rule 2: all GenCos settled on one action with the threshold probability.
    ThresholdProbability,
    /// Rule 3: action probabilities stayed stable over the check window.
    ActionProbability,
    /// Rule 4: learning results stayed stable over the check window.
    LearningResult,
    /// Rule 5: daily net earnings stayed within threshold over the window.
    DailyNetEarning,
}

impl RuleKind {
    pub const ALL: [RuleKind; 5] = [
        RuleKind::MaxDay,
        RuleKind::ThresholdProbability,
        RuleKind::ActionProbability,
        RuleKind::LearningResult,
        RuleKind::DailyNetEarning,
    ];

    /// 1-based rule number used in diagnostics.
    pub fn number(self) -> u8 {
        match self {
            RuleKind::MaxDay => 1,
            RuleKind::ThresholdProbability => 2,
            RuleKind::ActionProbability => 3,
            RuleKind::LearningResult => 4,
            RuleKind::DailyNetEarning => 5,
        }
    }

    fn bit(self) -> u8 {
        1 << (self.number() - 1)
    }

    pub fn label(self) -> &'static str {
        match self {
            RuleKind::MaxDay => "Maximum Day Check",
            RuleKind::ThresholdProbability => "Threshold Probability Check",
            RuleKind::ActionProbability => "GenCo Action Probability Check",
            RuleKind::LearningResult => "GenCo Action Stability Check",
            RuleKind::DailyNetEarning => "Daily Net Earnings Threshold Check",
        }
    }
}

/// Bitmask of the rules that fired on one tick; bit `i` is rule `i + 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopMask(u8);

impl StopMask {
    const VALID_BITS: u8 = 0b1_1111;

    pub fn empty() -> Self {
        Self(0)
    }

    /// Builds a mask from raw bits, discarding bits above rule 5.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::VALID_BITS)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn insert(&mut self, rule: RuleKind) {
        self.0 |= rule.bit();
    }

    pub fn contains(self, rule: RuleKind) -> bool {
        self.0 & rule.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Rules present in the mask, in rule order.
    pub fn rules(self) -> impl Iterator<Item = RuleKind> {
        RuleKind::ALL.into_iter().filter(move |r| self.contains(*r))
    }

    /// Natural-language list of the fired rule numbers.
    ///
    /// ```
    /// use wpm_cosim::sim::stopping::StopMask;
    ///
    /// assert_eq!(StopMask::from_bits(0b00101).explain(), "1, and 3");
    /// assert_eq!(StopMask::from_bits(0b10110).explain(), "2, 3, and 5");
    /// ```
    pub fn explain(self) -> String {
        let numbers: Vec<u8> = self.rules().map(RuleKind::number).collect();
        join_rule_numbers(&numbers)
    }
}

impl fmt::Display for StopMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explain())
    }
}

/// Joins rule numbers as `"a, b, and c"`; a single number stands alone.
pub fn join_rule_numbers(numbers: &[u8]) -> String {
    let mut out = String::new();
    let last = numbers.len().saturating_sub(1);
    for (i, n) in numbers.iter().enumerate() {
        if i == 0 {
            out.push_str(&n.to_string());
        } else if i == last {
            out.push_str(&format!(", and {n}"));
        } else {
            out.push_str(&format!(", {n}"));
        }
    }
    out
}

/// Everything one evaluation looks at.
#[derive(Debug, Clone, Copy)]
pub struct StopInputs<'a> {
    pub clock: ClockState,
    /// Action-domain shape of every GenCo, in registry order.
    pub learning: &'a [ActionDomainShape],
    pub flags: &'a ConvergenceFlags,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    kind: RuleKind,
    enabled: bool,
}

/// Evaluates the five stopping rules once per tick.
///
/// The engine keeps no history: windowed convergence is tracked by the
/// learning collaborator and arrives as flags.
#[derive(Debug, Clone)]
pub struct StoppingRuleEngine {
    rules: [Rule; 5],
    max_day: Option<u32>,
    threshold_probability: Option<f64>,
    action_probability: Option<CheckWindow>,
    learning_result: Option<CheckWindow>,
    daily_net_earning: Option<CheckWindow>,
}

impl StoppingRuleEngine {
    pub fn new(config: &StoppingConfig) -> Self {
        let enabled = |kind: RuleKind| match kind {
            RuleKind::MaxDay => config.max_day.is_some(),
            RuleKind::ThresholdProbability => config.threshold_probability.is_some(),
            RuleKind::ActionProbability => config.action_probability.is_some(),
            RuleKind::LearningResult => config.learning_result.is_some(),
            RuleKind::DailyNetEarning => config.daily_net_earning.is_some(),
        };
        Self {
            rules: RuleKind::ALL.map(|kind| Rule {
                kind,
                enabled: enabled(kind),
            }),
            max_day: config.max_day,
            threshold_probability: config.threshold_probability,
            action_probability: config.action_probability,
            learning_result: config.learning_result,
            daily_net_earning: config.daily_net_earning,
        }
    }

    pub fn is_enabled(&self, kind: RuleKind) -> bool {
        self.rules.iter().any(|r| r.kind == kind && r.enabled)
    }

    pub fn max_day(&self) -> Option<u32> {
        self.max_day
    }

    /// Recomputes the stop mask from scratch.
    pub fn evaluate(&self, inputs: &StopInputs<'_>) -> StopMask {
        let mut mask = StopMask::empty();
        for rule in self.rules.iter().filter(|r| r.enabled) {
            if self.holds(rule.kind, inputs) {
                debug!("stopping rule {} fired at {}", rule.kind.number(), inputs.clock);
                mask.insert(rule.kind);
            }
        }
        mask
    }

    fn max_day_reached(&self, clock: &ClockState) -> bool {
        self.max_day
            .is_some_and(|max| clock.hour == LAST_HOUR && clock.day == max)
    }

    fn holds(&self, kind: RuleKind, inputs: &StopInputs<'_>) -> bool {
        let flags = inputs.flags;
        match kind {
            RuleKind::MaxDay => self.max_day_reached(&inputs.clock),
            RuleKind::ThresholdProbability => {
                // All-fixed action domains mean nothing was learning.
                let fixed = inputs.learning.iter().filter(|d| d.is_single_action()).count();
                self.max_day_reached(&inputs.clock)
                    && flags.threshold_probability.unwrap_or(false)
                    && fixed != inputs.learning.len()
            }
            RuleKind::ActionProbability => flags.action_probability.unwrap_or(false),
            RuleKind::LearningResult => flags.learning_result.unwrap_or(false),
            RuleKind::DailyNetEarning => flags.daily_net_earning.unwrap_or(false),
        }
    }

    /// Logs the enabled rules and their parameters.
    pub fn log_summary(&self) {
        info!("stopping rules:");
        for rule in self.rules.iter().filter(|r| r.enabled) {
            let detail = match rule.kind {
                RuleKind::MaxDay => format!("maximum day {}", self.max_day.unwrap_or_default()),
                RuleKind::ThresholdProbability => format!(
                    "threshold probability {}",
                    self.threshold_probability.unwrap_or_default()
                ),
                RuleKind::ActionProbability => describe_window(self.action_probability),
                RuleKind::LearningResult => describe_window(self.learning_result),
                RuleKind::DailyNetEarning => describe_window(self.daily_net_earning),
            };
            info!("  ({}) {}: {detail}", rule.kind.number(), rule.kind.label());
        }
    }
}

fn describe_window(window: Option<CheckWindow>) -> String {
    match window {
        Some(w) => format!(
            "start day {}, consecutive days {}, threshold {}",
            w.start_day, w.day_length, w.threshold
        ),
        None => String::new(),
    }
}
