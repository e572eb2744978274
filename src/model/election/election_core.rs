use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

use super::status::{ElectionStatus, Transition};

pub type CandidateId = Id;

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    /// Election name, never blank.
    pub name: String,
    /// Free text shown alongside the name.
    #[serde(default)]
    pub description: String,
    /// Candidates, in display order.
    pub candidates: Vec<Candidate>,
    /// Start of the voting window.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// End of the voting window, strictly after `start_time`.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    pub visibility: Visibility,
    /// Voters permitted to vote in a restricted election. Empty for open elections.
    #[serde(default)]
    pub allowed_voters: BTreeSet<String>,
    pub status: ElectionStatus,
    /// Set once an explicit transition has contradicted the clock. While set,
    /// the stored status is never recomputed from the window.
    #[serde(default)]
    pub manual_override: bool,
    /// Which voters have voted. A convenience projection: the ballots
    /// collection is authoritative.
    #[serde(with = "voter_status_entries", default)]
    pub voter_status: BTreeMap<String, VoterStatus>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Election {
    /// Look up one of this election's candidates.
    pub fn candidate(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|candidate| candidate.id == id)
    }

    pub fn can_cast_ballot(&self) -> bool {
        self.status == ElectionStatus::Running
    }

    pub fn can_read_tally(&self) -> bool {
        self.status == ElectionStatus::Ended
    }

    /// May this voter vote in (and see) this election?
    pub fn is_eligible(&self, voter: &str) -> bool {
        match self.visibility {
            Visibility::Open => true,
            Visibility::Restricted => self.allowed_voters.contains(voter),
        }
    }

    /// Has this voter voted, according to the voter status projection?
    pub fn has_voted(&self, voter: &str) -> bool {
        self.voter_status
            .get(voter)
            .map(|status| status.has_voted)
            .unwrap_or(false)
    }

    /// The status this election should be moved to when read at `now`, if any.
    ///
    /// Recomputation is suppressed entirely by a manual override, and only
    /// ever moves the status forward.
    pub fn reconciled_status(&self, now: DateTime<Utc>) -> Option<ElectionStatus> {
        if self.manual_override {
            return None;
        }
        let derived = ElectionStatus::from_window(self.start_time, self.end_time, now);
        (derived > self.status).then_some(derived)
    }

    /// Check that `transition` is legal from the stored status and work out
    /// whether applying it at `now` contradicts the clock.
    ///
    /// Returns the value the override flag should take afterwards.
    pub fn check_transition(&self, transition: Transition, now: DateTime<Utc>) -> Result<bool> {
        if self.status != transition.from() {
            return Err(Error::InvalidTransition {
                transition,
                status: self.status,
            });
        }
        let derived = ElectionStatus::from_window(self.start_time, self.end_time, now);
        Ok(self.manual_override || derived != transition.to())
    }

    /// Add a blank voter status entry for every allowed voter that lacks one.
    pub(crate) fn seed_voter_status(&mut self) {
        for voter in &self.allowed_voters {
            self.voter_status.entry(voter.clone()).or_default();
        }
    }
}

/// A candidate standing in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    #[serde(default)]
    pub motto: String,
    /// Opaque reference to externally stored media.
    #[serde(default)]
    pub image_ref: Option<String>,
}

/// Who may vote.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Anyone authenticated as a voter.
    #[default]
    Open,
    /// Only the listed voters.
    Restricted,
}

/// Per-voter participation record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterStatus {
    pub has_voted: bool,
    pub voted_at: Option<DateTime<Utc>>,
}

/// Voter identifiers (typically e-mail addresses) are not valid document
/// keys, so the voter status map is stored as an array of entries.
pub(crate) mod voter_status_entries {
    use std::collections::BTreeMap;

    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::model::mongodb::opt_chrono_datetime_as_bson_datetime;

    use super::VoterStatus;

    #[derive(Serialize, Deserialize)]
    pub struct Entry {
        pub voter: String,
        pub has_voted: bool,
        #[serde(with = "opt_chrono_datetime_as_bson_datetime", default)]
        pub voted_at: Option<DateTime<Utc>>,
    }

    pub fn serialize<S>(
        map: &BTreeMap<String, VoterStatus>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let entries = map
            .iter()
            .map(|(voter, status)| Entry {
                voter: voter.clone(),
                has_voted: status.has_voted,
                voted_at: status.voted_at,
            })
            .collect::<Vec<_>>();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, VoterStatus>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let status = VoterStatus {
                    has_voted: entry.has_voted,
                    voted_at: entry.voted_at,
                };
                (entry.voter, status)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use mongodb::bson;

    use crate::model::election::ElectionSpec;

    fn election(spec: ElectionSpec, now: DateTime<Utc>) -> Election {
        spec.into_election(now, Duration::zero()).unwrap()
    }

    #[test]
    fn status_gates() {
        let now = Utc::now();
        let mut election = election(ElectionSpec::current_example(), now);

        election.status = ElectionStatus::Upcoming;
        assert!(!election.can_cast_ballot());
        assert!(!election.can_read_tally());

        election.status = ElectionStatus::Running;
        assert!(election.can_cast_ballot());
        assert!(!election.can_read_tally());

        election.status = ElectionStatus::Ended;
        assert!(!election.can_cast_ballot());
        assert!(election.can_read_tally());
    }

    #[test]
    fn recompute_moves_forward_only() {
        let now = Utc::now();
        let mut election = election(ElectionSpec::current_example(), now);
        assert_eq!(election.status, ElectionStatus::Running);

        // Stored ahead of the clock: left alone.
        election.status = ElectionStatus::Ended;
        assert_eq!(election.reconciled_status(now), None);

        // Stored behind the clock: caught up.
        election.status = ElectionStatus::Upcoming;
        assert_eq!(
            election.reconciled_status(now),
            Some(ElectionStatus::Running)
        );
        assert_eq!(
            election.reconciled_status(election.end_time + Duration::seconds(1)),
            Some(ElectionStatus::Ended)
        );
    }

    #[test]
    fn override_suppresses_recompute() {
        let now = Utc::now();
        let mut election = election(ElectionSpec::future_example(), now);
        election.status = ElectionStatus::Running;
        election.manual_override = true;
        assert_eq!(
            election.reconciled_status(election.end_time + Duration::days(1)),
            None
        );
    }

    #[test]
    fn transitions_that_contradict_the_clock_set_the_override() {
        let now = Utc::now();

        // Starting before the window opens.
        let early = election(ElectionSpec::future_example(), now);
        assert!(early.check_transition(Transition::Start, now).unwrap());

        // Starting once the window is open agrees with the clock.
        assert!(!early
            .check_transition(Transition::Start, early.start_time)
            .unwrap());

        // Ending while the window is still open.
        let running = election(ElectionSpec::current_example(), now);
        assert!(running.check_transition(Transition::End, now).unwrap());
        assert!(!running
            .check_transition(Transition::End, running.end_time + Duration::seconds(1))
            .unwrap());
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let now = Utc::now();
        let running = election(ElectionSpec::current_example(), now);
        assert!(matches!(
            running.check_transition(Transition::Start, now),
            Err(Error::InvalidTransition {
                transition: Transition::Start,
                status: ElectionStatus::Running,
            })
        ));

        let ended = election(ElectionSpec::past_example(), now);
        assert!(matches!(
            ended.check_transition(Transition::End, now),
            Err(Error::InvalidTransition { .. })
        ));
    }

    #[test]
    fn eligibility() {
        let now = Utc::now();
        let open = election(ElectionSpec::current_example(), now);
        assert!(open.is_eligible("anyone@example.com"));

        let restricted = election(ElectionSpec::restricted_example(), now);
        assert!(restricted.is_eligible("v1@example.com"));
        assert!(!restricted.is_eligible("v3@example.com"));
        assert!(!restricted.has_voted("v1@example.com"));
        assert!(restricted.voter_status.contains_key("v2@example.com"));
    }

    #[test]
    fn voter_status_is_stored_as_entries() {
        let now = Utc::now();
        let mut election = election(ElectionSpec::restricted_example(), now);
        election.voter_status.insert(
            "v1@example.com".to_string(),
            VoterStatus {
                has_voted: true,
                voted_at: Some(now),
            },
        );

        let doc = bson::to_document(&election).unwrap();
        let entries = doc.get_array("voter_status").unwrap();
        assert_eq!(entries.len(), 2);
        let first = entries[0].as_document().unwrap();
        assert_eq!(first.get_str("voter").unwrap(), "v1@example.com");
        assert!(first.get_bool("has_voted").unwrap());
        assert!(first.get_datetime("voted_at").is_ok());

        let back: Election = bson::from_document(doc).unwrap();
        assert!(back.has_voted("v1@example.com"));
        assert!(!back.has_voted("v2@example.com"));
        assert_eq!(back.voter_status.len(), 2);
    }
}
