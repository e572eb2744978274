use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

use super::election_core::{Candidate, Election, Visibility};
use super::status::ElectionStatus;

/// An election specification, as submitted by an organizer to create or
/// replace an election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub candidates: Vec<CandidateSpec>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Required for restricted elections, ignored for open ones.
    #[serde(default)]
    pub allowed_voters: Option<Vec<String>>,
}

/// A candidate specification. The ID is assigned on creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub motto: String,
    #[serde(default)]
    pub image_ref: Option<String>,
}

impl ElectionSpec {
    /// Check the specification, returning the normalised allowed voter set.
    ///
    /// Nothing is mutated until this has passed.
    pub fn validate(&self, min_duration: Duration) -> Result<BTreeSet<String>> {
        if self.name.trim().is_empty() {
            return Err(Error::BadRequest("Election name must not be empty".to_string()));
        }
        for (index, candidate) in self.candidates.iter().enumerate() {
            if candidate.name.trim().is_empty() {
                return Err(Error::BadRequest(format!(
                    "Candidate at index {index} must have a name"
                )));
            }
        }

        if self.end_time <= self.start_time {
            return Err(Error::InvalidDates(format!(
                "End time {} must be after start time {}",
                self.end_time, self.start_time
            )));
        }
        if self.end_time - self.start_time < min_duration {
            return Err(Error::InvalidDates(format!(
                "Election must last at least {} minutes",
                min_duration.num_minutes()
            )));
        }

        match self.visibility {
            Visibility::Open => Ok(BTreeSet::new()),
            Visibility::Restricted => {
                let voters = self.allowed_voters.as_deref().unwrap_or_default();
                if voters.is_empty() {
                    return Err(Error::InvalidVoterList(
                        "Restricted elections must list at least one allowed voter".to_string(),
                    ));
                }
                voters
                    .iter()
                    .enumerate()
                    .map(|(index, voter)| {
                        let voter = voter.trim();
                        if voter.is_empty() {
                            Err(Error::InvalidVoterList(format!(
                                "Allowed voter at index {index} is blank"
                            )))
                        } else {
                            Ok(voter.to_string())
                        }
                    })
                    .collect()
            }
        }
    }

    /// Validate this specification and build a new election from it, with
    /// its initial status derived from the window at `now`.
    pub fn into_election(self, now: DateTime<Utc>, min_duration: Duration) -> Result<Election> {
        let allowed_voters = self.validate(min_duration)?;
        let mut election = Election {
            id: Id::new(),
            name: self.name.trim().to_string(),
            description: self.description,
            candidates: self.candidates.into_iter().map(CandidateSpec::into).collect(),
            start_time: self.start_time,
            end_time: self.end_time,
            visibility: self.visibility,
            allowed_voters,
            status: ElectionStatus::from_window(self.start_time, self.end_time, now),
            manual_override: false,
            voter_status: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        };
        election.seed_voter_status();
        Ok(election)
    }

    /// Validate this specification and overwrite the editable parts of
    /// `election` with it.
    ///
    /// Candidates are replaced wholesale and get fresh IDs. Existing voter
    /// status entries are kept.
    pub fn apply_to(
        self,
        election: &mut Election,
        now: DateTime<Utc>,
        min_duration: Duration,
    ) -> Result<()> {
        let allowed_voters = self.validate(min_duration)?;
        election.name = self.name.trim().to_string();
        election.description = self.description;
        election.candidates = self.candidates.into_iter().map(CandidateSpec::into).collect();
        election.start_time = self.start_time;
        election.end_time = self.end_time;
        election.visibility = self.visibility;
        election.allowed_voters = allowed_voters;
        election.status = ElectionStatus::from_window(self.start_time, self.end_time, now);
        election.manual_override = false;
        election.updated_at = now;
        election.seed_voter_status();
        Ok(())
    }
}

impl From<CandidateSpec> for Candidate {
    fn from(spec: CandidateSpec) -> Self {
        Self {
            id: Id::new(),
            name: spec.name.trim().to_string(),
            motto: spec.motto,
            image_ref: spec.image_ref,
        }
    }
}
