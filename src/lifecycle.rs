//! The election lifecycle: creation, status transitions and the read path
//! that keeps stored statuses in step with the clock.

use chrono::{DateTime, Duration, Utc};
use log::info;

use crate::error::{Error, Result};
use crate::model::{
    election::{Election, ElectionSpec, ElectionStatus, Transition},
    mongodb::Id,
};
use crate::store::{SharedStore, StatusChange};

/// Owns election status. Every other service reads elections through here.
#[derive(Clone)]
pub struct Lifecycle {
    store: SharedStore,
    min_duration: Duration,
}

impl Lifecycle {
    pub fn new(store: SharedStore, min_duration: Duration) -> Self {
        Self {
            store,
            min_duration,
        }
    }

    /// Validate and persist a new election.
    pub async fn create(&self, spec: ElectionSpec, now: DateTime<Utc>) -> Result<Election> {
        let election = spec.into_election(now, self.min_duration)?;
        self.store.insert_election(&election).await?;
        info!(
            "Created election {} ({}), status {}",
            election.id, election.name, election.status
        );
        Ok(election)
    }

    /// Fetch an election, bringing its status up to date first.
    pub async fn get(&self, id: Id, now: DateTime<Utc>) -> Result<Election> {
        let election = self
            .store
            .election(id)
            .await?
            .ok_or(Error::ElectionNotFound(id))?;
        self.reconcile(election, now).await
    }

    /// Fetch every election, bringing each status up to date.
    pub async fn list(&self, now: DateTime<Utc>) -> Result<Vec<Election>> {
        let mut elections = Vec::new();
        for election in self.store.elections().await? {
            elections.push(self.reconcile(election, now).await?);
        }
        Ok(elections)
    }

    pub async fn start(&self, id: Id, now: DateTime<Utc>) -> Result<Election> {
        self.transition(id, Transition::Start, now).await
    }

    pub async fn end(&self, id: Id, now: DateTime<Utc>) -> Result<Election> {
        self.transition(id, Transition::End, now).await
    }

    /// Replace an election's details. Only allowed before voting opens.
    pub async fn modify(&self, id: Id, spec: ElectionSpec, now: DateTime<Utc>) -> Result<Election> {
        let mut election = self.get(id, now).await?;
        if election.status != ElectionStatus::Upcoming {
            return Err(Error::ElectionNotModifiable(election.status));
        }

        spec.apply_to(&mut election, now, self.min_duration)?;
        if !self
            .store
            .replace_election(&election, ElectionStatus::Upcoming)
            .await?
        {
            // Started or deleted since we read it.
            let current = self.get(id, now).await?;
            return Err(Error::ElectionNotModifiable(current.status));
        }
        info!("Modified election {id}, status {}", election.status);
        Ok(election)
    }

    /// Delete an election and all its ballots, whatever its status.
    pub async fn delete(&self, id: Id) -> Result<()> {
        if !self.store.delete_election(id).await? {
            return Err(Error::ElectionNotFound(id));
        }
        info!("Deleted election {id}");
        Ok(())
    }

    /// Apply an explicit transition, checked against the stored status.
    async fn transition(
        &self,
        id: Id,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Election> {
        let election = self
            .store
            .election(id)
            .await?
            .ok_or(Error::ElectionNotFound(id))?;
        let manual_override = election.check_transition(transition, now)?;

        let change = StatusChange {
            expected: transition.from(),
            expected_override: None,
            new: transition.to(),
            manual_override,
            at: now,
        };
        match self.store.change_status(id, change).await? {
            Some(updated) => {
                info!(
                    "Election {id} {} -> {}{}",
                    change.expected,
                    change.new,
                    if manual_override { " (manual override)" } else { "" }
                );
                Ok(updated)
            }
            None => {
                // Lost a race with another transition or a deletion.
                let current = self
                    .store
                    .election(id)
                    .await?
                    .ok_or(Error::ElectionNotFound(id))?;
                Err(Error::InvalidTransition {
                    transition,
                    status: current.status,
                })
            }
        }
    }

    /// Move the stored status forward to match the clock, unless an explicit
    /// transition has overridden it.
    async fn reconcile(&self, election: Election, now: DateTime<Utc>) -> Result<Election> {
        let new = match election.reconciled_status(now) {
            Some(new) => new,
            None => return Ok(election),
        };

        // An override applied since our read must not be clobbered.
        let change = StatusChange {
            expected: election.status,
            expected_override: Some(false),
            new,
            manual_override: false,
            at: now,
        };
        match self.store.change_status(election.id, change).await? {
            Some(updated) => {
                info!(
                    "Election {} {} -> {} (scheduled)",
                    election.id, change.expected, change.new
                );
                Ok(updated)
            }
            // Someone else moved it first; theirs wins.
            None => self
                .store
                .election(election.id)
                .await?
                .ok_or(Error::ElectionNotFound(election.id)),
        }
    }
}
