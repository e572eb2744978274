//! Persistence for elections and ballots.
//!
//! The core services only ever talk to a [`Store`]. [`MongoStore`] is used in
//! production; [`MemoryStore`] backs tests and local development.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mongodb::error::Error as DbError;
use thiserror::Error;

use crate::error::{Error, Result};
use crate::model::{
    ballot::Ballot,
    election::{Election, ElectionStatus},
    mongodb::Id,
};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

mod memory;
mod mongo;

/// A store shared between Rocket's managed state and the core services.
pub type SharedStore = Arc<dyn Store>;

/// Failure to insert a ballot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A ballot already exists for this voter in this election.
    #[error("Duplicate ballot")]
    Duplicate,
    #[error(transparent)]
    Other(#[from] Error),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        Self::Other(err.into())
    }
}

/// A compare-and-swap on an election's status.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// The status the election must currently be stored with.
    pub expected: ElectionStatus,
    /// The override flag the election must currently be stored with, if any.
    pub expected_override: Option<bool>,
    pub new: ElectionStatus,
    /// The override flag to store alongside the new status.
    pub manual_override: bool,
    pub at: DateTime<Utc>,
}

#[rocket::async_trait]
pub trait Store: Send + Sync {
    async fn insert_election(&self, election: &Election) -> Result<()>;

    async fn election(&self, id: Id) -> Result<Option<Election>>;

    /// All elections, oldest first.
    async fn elections(&self) -> Result<Vec<Election>>;

    /// Replace an election wholesale, but only if its stored status is still
    /// `expected`. Returns whether the replacement happened.
    async fn replace_election(&self, election: &Election, expected: ElectionStatus)
        -> Result<bool>;

    /// Apply `change` if the stored status (and override flag, when given)
    /// match, returning the updated election, or `None` if they do not match
    /// or the election is gone.
    async fn change_status(&self, id: Id, change: StatusChange) -> Result<Option<Election>>;

    /// Delete an election together with all of its ballots. Returns whether
    /// the election existed.
    async fn delete_election(&self, id: Id) -> Result<bool>;

    /// Record that `voter` has voted in the given election.
    async fn mark_voted(&self, id: Id, voter: &str, at: DateTime<Utc>) -> Result<()>;

    async fn ballot_exists(&self, election_id: Id, voter_key: &str) -> Result<bool>;

    /// Insert a ballot, failing with [`StoreError::Duplicate`] if one already
    /// exists for the same election and voter key, and with
    /// [`Error::ElectionNotFound`] if the election is gone.
    async fn insert_ballot(&self, ballot: &Ballot) -> std::result::Result<(), StoreError>;

    async fn ballots(&self, election_id: Id) -> Result<Vec<Ballot>>;

    async fn count_ballots(&self, election_id: Id) -> Result<u64>;
}
