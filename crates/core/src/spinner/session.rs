use rand::Rng;
use serde::Serialize;

use crate::spinner::target::{self, SpinOutcome};
use crate::spinner::{SpinnerError, WedgeSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SpinPhase {
    Idle,
    Spinning { outcome: SpinOutcome },
}

/// One wheel plus its spin lifecycle.
///
/// `Idle -> Spinning -> Idle`. The wedge set is frozen while spinning so the labels that picked the
/// winner are the labels the animation shows. A finished spin leaves the winner in `selected`
/// until [`SpinnerSession::acknowledge`] is called.
#[derive(Debug, Clone, Serialize)]
pub struct SpinnerSession {
    wedges: WedgeSet,
    phase: SpinPhase,
    rotation: f64,
    selected: Option<String>,
}

impl Default for SpinnerSession {
    fn default() -> Self {
        Self::new(WedgeSet::new())
    }
}

impl SpinnerSession {
    pub fn new(wedges: WedgeSet) -> Self {
        Self {
            wedges,
            phase: SpinPhase::Idle,
            rotation: 0.0,
            selected: None,
        }
    }

    pub fn wedges(&self) -> &WedgeSet {
        &self.wedges
    }

    pub fn phase(&self) -> SpinPhase {
        self.phase
    }

    pub fn is_spinning(&self) -> bool {
        matches!(self.phase, SpinPhase::Spinning { .. })
    }

    /// Absolute resting angle after the last completed spin. Never decreases.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn add_item(&mut self, input: &str) -> Result<&str, SpinnerError> {
        self.ensure_idle()?;
        self.wedges.push(input)
    }

    pub fn remove_item(&mut self, label: &str) -> Result<bool, SpinnerError> {
        self.ensure_idle()?;
        Ok(self.wedges.remove(label))
    }

    pub fn reorder_items(&mut self, from: usize, to: usize) -> Result<(), SpinnerError> {
        self.ensure_idle()?;
        self.wedges.reorder(from, to)
    }

    pub fn spin<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<SpinOutcome, SpinnerError> {
        self.ensure_idle()?;
        let count = self.wedges.len();
        if count < 2 {
            return Err(SpinnerError::NotEnoughWedges { count });
        }

        let outcome = target::spin(count, self.rotation, rng)?;
        self.selected = None;
        self.phase = SpinPhase::Spinning { outcome };
        tracing::debug!(
            wedges = count,
            winning_index = outcome.winning_index,
            target = outcome.target_rotation_degrees,
            "spin started"
        );
        Ok(outcome)
    }

    /// Called once the animation reached the target. Returns the winning label.
    pub fn complete_spin(&mut self) -> Result<&str, SpinnerError> {
        let SpinPhase::Spinning { outcome } = self.phase else {
            return Err(SpinnerError::NotSpinning);
        };
        let winner = self
            .wedges
            .get(outcome.winning_index)
            .ok_or(SpinnerError::NotSpinning)?
            .to_string();

        self.rotation = outcome.target_rotation_degrees;
        self.phase = SpinPhase::Idle;
        Ok(self.selected.insert(winner).as_str())
    }

    pub fn acknowledge(&mut self) {
        self.selected = None;
    }

    fn ensure_idle(&self) -> Result<(), SpinnerError> {
        if self.is_spinning() {
            return Err(SpinnerError::Busy);
        }
        Ok(())
    }
}
