use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::election::{Candidate, Election, ElectionStatus, Visibility, VoterStatus};

use super::id::ApiId;

/// An election as shown to a voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub name: String,
    pub description: String,
    pub candidates: Vec<CandidateDescription>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub visibility: Visibility,
    pub status: ElectionStatus,
    /// Whether the requesting voter has voted. Absent in admin views.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub has_voted: Option<bool>,
}

impl ElectionDescription {
    /// Describe `election` to the given voter.
    pub fn for_voter(election: &Election, voter: &str) -> Self {
        Self {
            has_voted: Some(election.has_voted(voter)),
            ..Self::from(election)
        }
    }
}

impl From<&Election> for ElectionDescription {
    fn from(election: &Election) -> Self {
        Self {
            id: election.id.into(),
            name: election.name.clone(),
            description: election.description.clone(),
            candidates: election.candidates.iter().map(Into::into).collect(),
            start_time: election.start_time,
            end_time: election.end_time,
            visibility: election.visibility,
            status: election.status,
            has_voted: None,
        }
    }
}

/// An election as shown to an organizer, including who may vote and who has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminElectionDescription {
    #[serde(flatten)]
    pub election: ElectionDescription,
    pub manual_override: bool,
    pub allowed_voters: Vec<String>,
    pub voter_status: BTreeMap<String, VoterStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Election> for AdminElectionDescription {
    fn from(election: &Election) -> Self {
        Self {
            election: election.into(),
            manual_override: election.manual_override,
            allowed_voters: election.allowed_voters.iter().cloned().collect(),
            voter_status: election.voter_status.clone(),
            created_at: election.created_at,
            updated_at: election.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub name: String,
    pub motto: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image_ref: Option<String>,
}

impl From<&Candidate> for CandidateDescription {
    fn from(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.name.clone(),
            motto: candidate.motto.clone(),
            image_ref: candidate.image_ref.clone(),
        }
    }
}
