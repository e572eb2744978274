//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.

pub use ballot::{BallotRecord, CastReceipt, CastRequest, VoteCount};
pub use election::{AdminElectionDescription, CandidateDescription, ElectionDescription};
pub use id::ApiId;

mod ballot;
mod election;
mod id;
