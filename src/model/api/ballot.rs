use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ballot::Ballot;

use super::id::ApiId;

/// A voter's choice, as submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastRequest {
    pub candidate_id: ApiId,
}

/// Proof that a ballot was accepted. Reveals nothing about the choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastReceipt {
    pub election_id: ApiId,
    pub ballot_id: ApiId,
    pub cast_at: DateTime<Utc>,
}

impl From<&Ballot> for CastReceipt {
    fn from(ballot: &Ballot) -> Self {
        Self {
            election_id: ballot.election_id.into(),
            ballot_id: ballot.id.into(),
            cast_at: ballot.cast_at,
        }
    }
}

/// A stored ballot as shown to an organizer for auditing. Still sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotRecord {
    pub id: ApiId,
    pub voter_key: String,
    pub encrypted_choice: String,
    pub nonce: String,
    pub cast_at: DateTime<Utc>,
}

impl From<Ballot> for BallotRecord {
    fn from(ballot: Ballot) -> Self {
        Self {
            id: ballot.id.into(),
            voter_key: ballot.voter_key,
            encrypted_choice: ballot.encrypted_choice,
            nonce: ballot.nonce,
            cast_at: ballot.cast_at,
        }
    }
}

/// The number of ballots cast in an election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCount {
    pub election_id: ApiId,
    pub votes: u64,
}
