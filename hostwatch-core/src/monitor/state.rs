//! Per-target up/down tracking.

/// Outcome of feeding one observation into a [`TargetState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First observation; establishes the baseline without alerting.
    Baseline { up: bool },
    WentDown,
    Recovered,
    Unchanged,
}

/// Last known classification of one target. `None` until first observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetState {
    pub last_known_up: Option<bool>,
}

impl TargetState {
    pub fn observe(&mut self, up: bool) -> Transition {
        let transition = match self.last_known_up {
            None => Transition::Baseline { up },
            Some(true) if !up => Transition::WentDown,
            Some(false) if up => Transition::Recovered,
            Some(_) => Transition::Unchanged,
        };
        self.last_known_up = Some(up);
        transition
    }
}
