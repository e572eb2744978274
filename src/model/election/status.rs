use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use mongodb::bson::{self, Bson};
use serde::{Deserialize, Serialize};

/// Stages of the election lifecycle, in the only order they may be visited.
///
/// The derived ordering follows declaration order, so `Upcoming < Running < Ended`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// Created, voting window not yet open.
    Upcoming,
    /// Ballots may be cast.
    Running,
    /// Voting closed, results may be read.
    Ended,
}

impl ElectionStatus {
    /// The status implied purely by the clock.
    ///
    /// Both ends of the window are inclusive of `Running`.
    pub fn from_window(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < start {
            Self::Upcoming
        } else if now <= end {
            Self::Running
        } else {
            Self::Ended
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Running => "running",
            Self::Ended => "ended",
        }
    }
}

impl Display for ElectionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        bson::to_bson(&status).expect("Serialisation is infallible")
    }
}

/// An explicit, organizer-requested status change.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transition {
    Start,
    End,
}

impl Transition {
    /// The status an election must be in for this transition to apply.
    pub fn from(&self) -> ElectionStatus {
        match self {
            Self::Start => ElectionStatus::Upcoming,
            Self::End => ElectionStatus::Running,
        }
    }

    /// The status an election is in after this transition.
    pub fn to(&self) -> ElectionStatus {
        match self {
            Self::Start => ElectionStatus::Running,
            Self::End => ElectionStatus::Ended,
        }
    }
}

impl Display for Transition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::End => write!(f, "end"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    #[test]
    fn window_boundaries() {
        let start = Utc::now();
        let end = start + Duration::hours(1);

        assert_eq!(
            ElectionStatus::from_window(start, end, start - Duration::seconds(1)),
            ElectionStatus::Upcoming
        );
        assert_eq!(
            ElectionStatus::from_window(start, end, start),
            ElectionStatus::Running
        );
        assert_eq!(
            ElectionStatus::from_window(start, end, end),
            ElectionStatus::Running
        );
        assert_eq!(
            ElectionStatus::from_window(start, end, end + Duration::seconds(1)),
            ElectionStatus::Ended
        );
    }

    #[test]
    fn statuses_are_ordered() {
        assert!(ElectionStatus::Upcoming < ElectionStatus::Running);
        assert!(ElectionStatus::Running < ElectionStatus::Ended);
    }

    #[test]
    fn transitions_step_forward_by_one() {
        for transition in [Transition::Start, Transition::End] {
            assert!(transition.from() < transition.to());
        }
        assert_eq!(Transition::Start.to(), Transition::End.from());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(Bson::from(ElectionStatus::Running), Bson::String("running".into()));
    }
}
