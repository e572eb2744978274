pub use election_core::{Candidate, CandidateId, Election, Visibility, VoterStatus};
pub use spec::{CandidateSpec, ElectionSpec};
pub use status::{ElectionStatus, Transition};

mod election_core;
mod spec;
mod status;
