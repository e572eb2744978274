//! Counting the ballots of an ended election.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lifecycle::Lifecycle;
use crate::model::{
    api::ApiId,
    ballot::{Ballot, BallotKey},
    election::Election,
    mongodb::Id,
};
use crate::store::SharedStore;

/// The result of an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub election_id: ApiId,
    /// One entry per candidate, in the election's candidate order.
    pub results: Vec<CandidateResult>,
    /// Ballots that could not be counted.
    pub skipped: u64,
    pub total_ballots: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate_id: ApiId,
    pub name: String,
    pub votes: u64,
}

/// Decrypts and counts ballots, once an election has ended.
#[derive(Clone)]
pub struct TallyEngine {
    lifecycle: Lifecycle,
    store: SharedStore,
    key: Arc<BallotKey>,
}

impl TallyEngine {
    pub fn new(lifecycle: Lifecycle, store: SharedStore, key: Arc<BallotKey>) -> Self {
        Self {
            lifecycle,
            store,
            key,
        }
    }

    pub async fn tally(&self, election_id: Id, now: DateTime<Utc>) -> Result<Tally> {
        let election = self.lifecycle.get(election_id, now).await?;
        if !election.can_read_tally() {
            return Err(Error::ResultsNotAvailable(election.status));
        }
        let ballots = self.store.ballots(election_id).await?;
        let tally = count(&election, &ballots, &self.key);
        info!(
            "Tallied election {election_id}: {} ballots, {} skipped",
            tally.total_ballots, tally.skipped
        );
        Ok(tally)
    }
}

/// Count `ballots` towards `election`'s candidates.
///
/// Ballots that fail to decrypt, or decrypt to something other than one of
/// the candidates, are skipped.
pub fn count(election: &Election, ballots: &[Ballot], key: &BallotKey) -> Tally {
    let mut votes: HashMap<Id, u64> = election
        .candidates
        .iter()
        .map(|candidate| (candidate.id, 0))
        .collect();
    let mut skipped = 0;

    for ballot in ballots {
        let choice = ballot
            .sealed_choice()
            .and_then(|sealed| key.open(election.id, &sealed));
        match choice {
            Ok(candidate_id) => match votes.get_mut(&candidate_id) {
                Some(count) => *count += 1,
                None => {
                    warn!(
                        "Skipping ballot {} in election {}: unknown candidate {candidate_id}",
                        ballot.id, election.id
                    );
                    skipped += 1;
                }
            },
            Err(err) => {
                warn!(
                    "Skipping ballot {} in election {}: {err}",
                    ballot.id, election.id
                );
                skipped += 1;
            }
        }
    }

    let results = election
        .candidates
        .iter()
        .map(|candidate| CandidateResult {
            candidate_id: candidate.id.into(),
            name: candidate.name.clone(),
            votes: votes.get(&candidate.id).copied().unwrap_or_default(),
        })
        .collect();

    Tally {
        election_id: election.id.into(),
        results,
        skipped,
        total_ballots: ballots.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    use crate::ballot_box::{tests::test_key, BallotBox};
    use crate::model::{
        ballot::{SealedChoice, VoterPseudonymizer},
        election::{ElectionSpec, ElectionStatus},
    };
    use crate::store::{MemoryStore, Store};

    struct Harness {
        lifecycle: Lifecycle,
        ballot_box: BallotBox,
        engine: TallyEngine,
    }

    fn harness(store: &Arc<MemoryStore>) -> Harness {
        let lifecycle = Lifecycle::new(store.clone(), Duration::minutes(15));
        let pseudonyms = Arc::new(VoterPseudonymizer::new("test hmac secret").unwrap());
        Harness {
            ballot_box: BallotBox::new(lifecycle.clone(), store.clone(), test_key(), pseudonyms),
            engine: TallyEngine::new(lifecycle.clone(), store.clone(), test_key()),
            lifecycle,
        }
    }

    fn votes(tally: &Tally) -> Vec<(String, u64)> {
        tally
            .results
            .iter()
            .map(|result| (result.name.clone(), result.votes))
            .collect()
    }

    #[backend_test]
    async fn open_election_scenario(store: Arc<MemoryStore>) {
        let h = harness(&store);
        let now = Utc::now();
        let election = h
            .lifecycle
            .create(ElectionSpec::current_example(), now)
            .await
            .unwrap();
        let a = election.candidates[0].id;
        let b = election.candidates[1].id;

        h.ballot_box.cast(election.id, "voter1", a, now).await.unwrap();
        h.ballot_box.cast(election.id, "voter2", b, now).await.unwrap();
        h.ballot_box.cast(election.id, "voter3", a, now).await.unwrap();
        assert!(matches!(
            h.ballot_box.cast(election.id, "voter2", a, now).await,
            Err(Error::AlreadyVoted)
        ));

        h.lifecycle.end(election.id, now).await.unwrap();
        let tally = h.engine.tally(election.id, now).await.unwrap();
        assert_eq!(
            votes(&tally),
            vec![("Alice".to_string(), 2), ("Bob".to_string(), 1)]
        );
        assert_eq!(tally.skipped, 0);
        assert_eq!(tally.total_ballots, 3);
        assert_eq!(*tally.results[0].candidate_id, a);
    }

    #[backend_test]
    async fn results_are_hidden_until_ended(store: Arc<MemoryStore>) {
        let h = harness(&store);
        let now = Utc::now();

        let upcoming = h
            .lifecycle
            .create(ElectionSpec::future_example(), now)
            .await
            .unwrap();
        assert!(matches!(
            h.engine.tally(upcoming.id, now).await,
            Err(Error::ResultsNotAvailable(ElectionStatus::Upcoming))
        ));

        let running = h
            .lifecycle
            .create(ElectionSpec::current_example(), now)
            .await
            .unwrap();
        h.ballot_box
            .cast(running.id, "voter1", running.candidates[0].id, now)
            .await
            .unwrap();
        assert!(matches!(
            h.engine.tally(running.id, now).await,
            Err(Error::ResultsNotAvailable(ElectionStatus::Running))
        ));

        assert!(matches!(
            h.engine.tally(Id::new(), now).await,
            Err(Error::ElectionNotFound(_))
        ));
    }

    #[backend_test]
    async fn results_appear_once_the_window_closes(store: Arc<MemoryStore>) {
        let h = harness(&store);
        let now = Utc::now();
        let election = h
            .lifecycle
            .create(ElectionSpec::current_example(), now)
            .await
            .unwrap();
        h.ballot_box
            .cast(election.id, "voter1", election.candidates[1].id, now)
            .await
            .unwrap();

        let after = election.end_time + Duration::seconds(1);
        let tally = h.engine.tally(election.id, after).await.unwrap();
        assert_eq!(
            votes(&tally),
            vec![("Alice".to_string(), 0), ("Bob".to_string(), 1)]
        );
    }

    #[backend_test]
    async fn bad_ballots_are_skipped(store: Arc<MemoryStore>) {
        let h = harness(&store);
        let now = Utc::now();
        let election = h
            .lifecycle
            .create(ElectionSpec::current_example(), now)
            .await
            .unwrap();
        let a = election.candidates[0].id;
        h.ballot_box.cast(election.id, "voter1", a, now).await.unwrap();

        // Sealed under another key.
        let foreign = BallotKey::derive("another secret")
            .unwrap()
            .seal(election.id, a)
            .unwrap();
        store
            .insert_ballot(&Ballot::new(election.id, "k1".to_string(), &foreign, now))
            .await
            .unwrap();

        // Valid, but for someone who is not standing.
        let stranger = test_key().seal(election.id, Id::new()).unwrap();
        store
            .insert_ballot(&Ballot::new(election.id, "k2".to_string(), &stranger, now))
            .await
            .unwrap();

        // Not even hex.
        let mut garbage = Ballot::new(
            election.id,
            "k3".to_string(),
            &SealedChoice {
                ciphertext: vec![],
                nonce: [0; 12],
            },
            now,
        );
        garbage.encrypted_choice = "not hex".to_string();
        store.insert_ballot(&garbage).await.unwrap();

        h.lifecycle.end(election.id, now).await.unwrap();
        let tally = h.engine.tally(election.id, now).await.unwrap();
        assert_eq!(tally.total_ballots, 4);
        assert_eq!(tally.skipped, 3);
        assert_eq!(votes(&tally)[0], ("Alice".to_string(), 1));

        let counted: u64 = tally.results.iter().map(|result| result.votes).sum();
        assert_eq!(counted, tally.total_ballots - tally.skipped);
    }

    #[test]
    fn counts_sum_to_valid_ballots() {
        let key = test_key();
        let election = ElectionSpec::past_example()
            .into_election(Utc::now(), Duration::zero())
            .unwrap();
        let now = Utc::now();
        let ballots = (0..25)
            .map(|i| {
                let candidate = election.candidates[i % 2].id;
                let sealed = key.seal(election.id, candidate).unwrap();
                Ballot::new(election.id, format!("voter{i}"), &sealed, now)
            })
            .collect::<Vec<_>>();

        let tally = count(&election, &ballots, &key);
        assert_eq!(tally.total_ballots, 25);
        assert_eq!(tally.skipped, 0);
        assert_eq!(
            votes(&tally),
            vec![("Alice".to_string(), 13), ("Bob".to_string(), 12)]
        );
    }
}
