use serde::{Deserialize, Serialize};

use super::phase::Phase;
use crate::error::ValidationError;

/// Which built-in scenario is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepsMode {
    #[default]
    #[serde(rename = "4 steps")]
    FourSteps,
    #[serde(rename = "8 steps")]
    EightSteps,
}

impl StepsMode {
    pub fn label(self) -> &'static str {
        match self {
            StepsMode::FourSteps => "4 steps",
            StepsMode::EightSteps => "8 steps",
        }
    }

    pub fn scenario(self) -> Scenario {
        use Phase::*;
        let phases = match self {
            StepsMode::FourSteps => vec![Work, ShortBreak, Work, LongBreak],
            StepsMode::EightSteps => vec![
                Work, ShortBreak, Work, ShortBreak, Work, ShortBreak, Work, LongBreak,
            ],
        };
        Scenario { phases }
    }
}

impl std::str::FromStr for StepsMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "4 steps" | "4" | "four" => Ok(StepsMode::FourSteps),
            "8 steps" | "8" | "eight" => Ok(StepsMode::EightSteps),
            other => Err(ValidationError::InvalidValue {
                field: "stepsMode".into(),
                message: format!("unknown steps mode '{other}'"),
            }),
        }
    }
}

/// Ordered, non-empty sequence of phases making up one full cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    phases: Vec<Phase>,
}

impl Scenario {
    /// Build a custom scenario.
    ///
    /// # Errors
    /// Returns an error if `phases` is empty.
    pub fn new(phases: Vec<Phase>) -> Result<Self, ValidationError> {
        if phases.is_empty() {
            return Err(ValidationError::EmptyCollection("scenario".into()));
        }
        Ok(Self { phases })
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Always false for a constructed scenario; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Phase at a 1-based `step`, or `None` when out of range.
    pub fn phase_at(&self, step: usize) -> Option<Phase> {
        step.checked_sub(1).and_then(|i| self.phases.get(i)).copied()
    }
}

impl Default for Scenario {
    fn default() -> Self {
        StepsMode::default().scenario()
    }
}

/// Step state machine over `1..=scenario.len()`.
///
/// The sequencer never resets any countdown itself; the engine performs a
/// phase reset after every transition reported here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequencer {
    scenario: Scenario,
    step: usize,
}

impl Sequencer {
    pub fn new(scenario: Scenario) -> Self {
        Self { scenario, step: 1 }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Current phase. An out-of-range step (possible only for restored state)
    /// resolves to `Work`.
    pub fn phase(&self) -> Phase {
        self.scenario.phase_at(self.step).unwrap_or(Phase::Work)
    }

    /// Move forward exactly one position, wrapping to 1 after the last step.
    /// Returns the new step.
    pub fn advance(&mut self) -> usize {
        self.step = if self.step < self.scenario.len() {
            self.step + 1
        } else {
            1
        };
        self.step
    }

    /// # Errors
    /// Returns an error if `step` is 0 or past the end of the scenario.
    pub fn check_step(&self, step: usize) -> Result<(), ValidationError> {
        if step == 0 || step > self.scenario.len() {
            return Err(ValidationError::OutOfBounds {
                collection: "scenario".into(),
                index: step,
                len: self.scenario.len(),
            });
        }
        Ok(())
    }

    /// Jump to a 1-based step.
    ///
    /// # Errors
    /// Returns an error if `step` is 0 or past the end of the scenario.
    pub fn set_step(&mut self, step: usize) -> Result<(), ValidationError> {
        self.check_step(step)?;
        self.step = step;
        Ok(())
    }

    /// Swap the active scenario and return to step 1.
    pub fn change_scenario(&mut self, scenario: Scenario) {
        self.scenario = scenario;
        self.step = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn four_steps_layout() {
        let s = StepsMode::FourSteps.scenario();
        assert_eq!(
            s.phases(),
            &[Phase::Work, Phase::ShortBreak, Phase::Work, Phase::LongBreak]
        );
    }

    #[test]
    fn eight_steps_ends_with_long_break() {
        let s = StepsMode::EightSteps.scenario();
        assert_eq!(s.len(), 8);
        assert_eq!(s.phase_at(8), Some(Phase::LongBreak));
        assert_eq!(s.phases().iter().filter(|p| **p == Phase::Work).count(), 4);
    }

    #[test]
    fn empty_scenario_is_rejected() {
        assert!(matches!(
            Scenario::new(vec![]),
            Err(ValidationError::EmptyCollection(_))
        ));
    }

    #[test]
    fn advance_wraps_to_first_step() {
        let mut seq = Sequencer::new(StepsMode::FourSteps.scenario());
        assert_eq!(seq.advance(), 2);
        assert_eq!(seq.advance(), 3);
        assert_eq!(seq.advance(), 4);
        assert_eq!(seq.phase(), Phase::LongBreak);
        assert_eq!(seq.advance(), 1);
        assert_eq!(seq.phase(), Phase::Work);
    }

    #[test]
    fn set_step_validates_range() {
        let mut seq = Sequencer::new(StepsMode::FourSteps.scenario());
        assert!(seq.set_step(0).is_err());
        assert!(seq.set_step(5).is_err());
        seq.set_step(4).unwrap();
        assert_eq!(seq.phase(), Phase::LongBreak);
    }

    #[test]
    fn out_of_range_step_falls_back_to_work() {
        let mut seq = Sequencer::new(StepsMode::EightSteps.scenario());
        seq.set_step(8).unwrap();
        // Simulates state restored against a shorter scenario.
        let json = serde_json::to_value(&seq).unwrap();
        let mut restored: Sequencer = serde_json::from_value(json).unwrap();
        restored.scenario = StepsMode::FourSteps.scenario();
        assert_eq!(restored.phase(), Phase::Work);
    }

    #[test]
    fn change_scenario_resets_step() {
        let mut seq = Sequencer::new(StepsMode::FourSteps.scenario());
        seq.set_step(3).unwrap();
        seq.change_scenario(StepsMode::EightSteps.scenario());
        assert_eq!(seq.step(), 1);
        assert_eq!(seq.scenario().len(), 8);
    }

    #[test]
    fn steps_mode_parses_labels() {
        assert_eq!("8 steps".parse::<StepsMode>().unwrap(), StepsMode::EightSteps);
        assert_eq!("4".parse::<StepsMode>().unwrap(), StepsMode::FourSteps);
        assert!("12 steps".parse::<StepsMode>().is_err());
        assert_eq!(
            serde_json::to_string(&StepsMode::EightSteps).unwrap(),
            "\"8 steps\""
        );
    }

    proptest! {
        #[test]
        fn advance_moves_exactly_one(len in 1usize..16, start in 1usize..16, hops in 0usize..64) {
            let phases = (0..len).map(|i| Phase::ALL[i % 3]).collect();
            let mut seq = Sequencer::new(Scenario::new(phases).unwrap());
            let start = ((start - 1) % len) + 1;
            seq.set_step(start).unwrap();
            for _ in 0..hops {
                seq.advance();
            }
            prop_assert_eq!(seq.step(), ((start - 1 + hops) % len) + 1);
        }
    }
}
