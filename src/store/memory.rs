use std::collections::{hash_map::Entry, HashMap};

use chrono::{DateTime, Utc};
use rocket::tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{
    ballot::Ballot,
    election::{Election, ElectionStatus, VoterStatus},
    mongodb::Id,
};

use super::{StatusChange, Store, StoreError};

/// An in-process store. Every operation takes a single lock, so check-then-write
/// sequences inside one operation are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    elections: HashMap<Id, Election>,
    /// Keyed by `(election_id, voter_key)`, mirroring the unique index.
    ballots: HashMap<(Id, String), Ballot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn insert_election(&self, election: &Election) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.elections.insert(election.id, election.clone());
        Ok(())
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        let tables = self.tables.lock().await;
        Ok(tables.elections.get(&id).cloned())
    }

    async fn elections(&self) -> Result<Vec<Election>> {
        let tables = self.tables.lock().await;
        let mut elections = tables.elections.values().cloned().collect::<Vec<_>>();
        elections.sort_by_key(|election| (election.created_at, election.id));
        Ok(elections)
    }

    async fn replace_election(
        &self,
        election: &Election,
        expected: ElectionStatus,
    ) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.elections.get_mut(&election.id) {
            Some(stored) if stored.status == expected => {
                *stored = election.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn change_status(&self, id: Id, change: StatusChange) -> Result<Option<Election>> {
        let mut tables = self.tables.lock().await;
        match tables.elections.get_mut(&id) {
            Some(stored)
                if stored.status == change.expected
                    && change
                        .expected_override
                        .map_or(true, |flag| stored.manual_override == flag) =>
            {
                stored.status = change.new;
                stored.manual_override = change.manual_override;
                stored.updated_at = change.at;
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_election(&self, id: Id) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        if tables.elections.remove(&id).is_none() {
            return Ok(false);
        }
        tables
            .ballots
            .retain(|(election_id, _), _| *election_id != id);
        Ok(true)
    }

    async fn mark_voted(&self, id: Id, voter: &str, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(election) = tables.elections.get_mut(&id) {
            election.voter_status.insert(
                voter.to_string(),
                VoterStatus {
                    has_voted: true,
                    voted_at: Some(at),
                },
            );
        }
        Ok(())
    }

    async fn ballot_exists(&self, election_id: Id, voter_key: &str) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .ballots
            .contains_key(&(election_id, voter_key.to_string())))
    }

    async fn insert_ballot(&self, ballot: &Ballot) -> std::result::Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        // Checked under the same lock as the cascade in `delete_election`.
        if !tables.elections.contains_key(&ballot.election_id) {
            return Err(Error::ElectionNotFound(ballot.election_id).into());
        }
        match tables
            .ballots
            .entry((ballot.election_id, ballot.voter_key.clone()))
        {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(entry) => {
                entry.insert(ballot.clone());
                Ok(())
            }
        }
    }

    async fn ballots(&self, election_id: Id) -> Result<Vec<Ballot>> {
        let tables = self.tables.lock().await;
        let mut ballots = tables
            .ballots
            .values()
            .filter(|ballot| ballot.election_id == election_id)
            .cloned()
            .collect::<Vec<_>>();
        ballots.sort_by_key(|ballot| (ballot.cast_at, ballot.id));
        Ok(ballots)
    }

    async fn count_ballots(&self, election_id: Id) -> Result<u64> {
        let tables = self.tables.lock().await;
        let count = tables
            .ballots
            .keys()
            .filter(|(id, _)| *id == election_id)
            .count();
        Ok(count as u64)
    }
}
