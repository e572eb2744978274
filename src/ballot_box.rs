//! Casting and storing ballots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::error::{Error, Result};
use crate::lifecycle::Lifecycle;
use crate::model::{
    api::CastReceipt,
    ballot::{Ballot, BallotKey, VoterPseudonymizer},
    election::CandidateId,
    mongodb::Id,
};
use crate::store::{SharedStore, StoreError};

/// Accepts ballots while an election is running, at most one per voter.
#[derive(Clone)]
pub struct BallotBox {
    lifecycle: Lifecycle,
    store: SharedStore,
    key: Arc<BallotKey>,
    pseudonyms: Arc<VoterPseudonymizer>,
}

impl BallotBox {
    pub fn new(
        lifecycle: Lifecycle,
        store: SharedStore,
        key: Arc<BallotKey>,
        pseudonyms: Arc<VoterPseudonymizer>,
    ) -> Self {
        Self {
            lifecycle,
            store,
            key,
            pseudonyms,
        }
    }

    /// Cast `voter`'s ballot for `candidate_id`.
    ///
    /// Not idempotent: a retry after an ambiguous failure may report
    /// [`Error::AlreadyVoted`] for a ballot that was in fact stored.
    pub async fn cast(
        &self,
        election_id: Id,
        voter: &str,
        candidate_id: CandidateId,
        now: DateTime<Utc>,
    ) -> Result<CastReceipt> {
        let election = self.lifecycle.get(election_id, now).await?;
        if !election.can_cast_ballot() {
            return Err(Error::ElectionNotRunning(election.status));
        }
        if election.candidate(candidate_id).is_none() {
            return Err(Error::InvalidCandidate(candidate_id));
        }
        if !election.is_eligible(voter) {
            return Err(Error::VoterNotEligible);
        }

        let voter_key = self.pseudonyms.voter_key(election_id, voter);
        if self.store.ballot_exists(election_id, &voter_key).await? {
            return Err(Error::AlreadyVoted);
        }

        let sealed = self.key.seal(election_id, candidate_id)?;
        let ballot = Ballot::new(election_id, voter_key, &sealed, now);
        match self.store.insert_ballot(&ballot).await {
            Ok(()) => {}
            // Lost the race against a concurrent cast by the same voter.
            Err(StoreError::Duplicate) => return Err(Error::AlreadyVoted),
            Err(StoreError::Other(err)) => return Err(err),
        }
        info!(
            "Ballot {} cast in election {election_id} by voter {}",
            ballot.id, ballot.voter_key
        );

        if let Err(err) = self.store.mark_voted(election_id, voter, now).await {
            warn!(
                "Failed to record voter {} as voted in election {election_id}: {err}",
                ballot.voter_key
            );
        }

        Ok((&ballot).into())
    }

    /// The number of ballots cast in an election, in any status.
    pub async fn vote_count(&self, election_id: Id, now: DateTime<Utc>) -> Result<u64> {
        self.lifecycle.get(election_id, now).await?;
        self.store.count_ballots(election_id).await
    }

    /// The sealed ballots of an election, oldest first.
    pub async fn ballots(&self, election_id: Id, now: DateTime<Utc>) -> Result<Vec<Ballot>> {
        self.lifecycle.get(election_id, now).await?;
        self.store.ballots(election_id).await
    }
}
