use crate::CoreError;
use bikeshare_schema::BikeId;
use std::fmt;

/// Reservation state of a single bike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Reserved,
}

impl Availability {
    /// The stored `available` flag for this state.
    pub fn flag(self) -> bool {
        self == Availability::Available
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Available => write!(f, "available"),
            Availability::Reserved => write!(f, "reserved"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Reserve,
    Clear,
}

impl Transition {
    /// State a bike must be in for the transition to apply.
    pub fn from_state(self) -> Availability {
        match self {
            Transition::Reserve => Availability::Available,
            Transition::Clear => Availability::Reserved,
        }
    }

    pub fn to_state(self) -> Availability {
        match self {
            Transition::Reserve => Availability::Reserved,
            Transition::Clear => Availability::Available,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Reserve => write!(f, "reserve"),
            Transition::Clear => write!(f, "clear"),
        }
    }
}

pub fn validate_transition(
    id: &BikeId,
    current: Availability,
    transition: Transition,
) -> Result<Availability, CoreError> {
    if current == transition.from_state() {
        Ok(transition.to_state())
    } else {
        Err(CoreError::InvalidTransition {
            id: id.clone(),
            transition,
            state: current,
        })
    }
}
