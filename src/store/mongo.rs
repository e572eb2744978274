use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, Database,
};
use rocket::futures::TryStreamExt;

use crate::error::Result;
use crate::model::{
    ballot::Ballot,
    election::{Election, ElectionStatus},
    mongodb::{ensure_indexes_exist, is_duplicate_key_error, Coll, Id},
};

use super::{StatusChange, Store, StoreError};

/// A store backed by a MongoDB database.
///
/// Cascading deletes use multi-document transactions, so the server must be
/// a replica set or sharded cluster.
pub struct MongoStore {
    client: Client,
    elections: Coll<Election>,
    ballots: Coll<Ballot>,
}

impl MongoStore {
    /// Wrap the given database, creating any missing indexes.
    pub async fn new(client: Client, db: &Database) -> std::result::Result<Self, DbError> {
        ensure_indexes_exist(db).await?;
        Ok(Self {
            client,
            elections: Coll::from_db(db),
            ballots: Coll::from_db(db),
        })
    }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn insert_election(&self, election: &Election) -> Result<()> {
        self.elections.insert_one(election, None).await?;
        Ok(())
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.elections.find_one(id.as_doc(), None).await?)
    }

    async fn elections(&self) -> Result<Vec<Election>> {
        let options = FindOptions::builder()
            .sort(doc! {"created_at": 1, "_id": 1})
            .build();
        let elections = self
            .elections
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    async fn replace_election(
        &self,
        election: &Election,
        expected: ElectionStatus,
    ) -> Result<bool> {
        let filter = doc! {
            "_id": election.id,
            "status": expected,
        };
        let result = self.elections.replace_one(filter, election, None).await?;
        Ok(result.matched_count == 1)
    }

    async fn change_status(&self, id: Id, change: StatusChange) -> Result<Option<Election>> {
        let mut filter = doc! {
            "_id": id,
            "status": change.expected,
        };
        if let Some(manual_override) = change.expected_override {
            filter.insert("manual_override", manual_override);
        }
        let update = doc! {
            "$set": {
                "status": change.new,
                "manual_override": change.manual_override,
                "updated_at": BsonDateTime::from_chrono(change.at),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .elections
            .find_one_and_update(filter, update, options)
            .await?)
    }

    async fn delete_election(&self, id: Id) -> Result<bool> {
        // Atomically delete the election and its ballots. A ballot inserted
        // outside the transaction after the cascade's snapshot can still
        // outlive the election; nothing reads ballots without first loading
        // their election, so such a ballot is unreachable.
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let result = self
            .elections
            .delete_one_with_session(id.as_doc(), None, &mut session)
            .await?;
        if result.deleted_count == 0 {
            session.abort_transaction().await?;
            return Ok(false);
        }

        self.ballots
            .delete_many_with_session(doc! {"election_id": id}, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(true)
    }

    async fn mark_voted(&self, id: Id, voter: &str, at: DateTime<Utc>) -> Result<()> {
        let voted_at = BsonDateTime::from_chrono(at);

        // Update the voter's existing entry, if there is one.
        let filter = doc! {
            "_id": id,
            "voter_status.voter": voter,
        };
        let update = doc! {
            "$set": {
                "voter_status.$.has_voted": true,
                "voter_status.$.voted_at": voted_at,
            }
        };
        let result = self.elections.update_one(filter, update, None).await?;
        if result.matched_count > 0 {
            return Ok(());
        }

        // Otherwise append one, unless a concurrent update got there first.
        let filter = doc! {
            "_id": id,
            "voter_status.voter": { "$ne": voter },
        };
        let update = doc! {
            "$push": {
                "voter_status": {
                    "voter": voter,
                    "has_voted": true,
                    "voted_at": voted_at,
                }
            }
        };
        self.elections.update_one(filter, update, None).await?;
        Ok(())
    }

    async fn ballot_exists(&self, election_id: Id, voter_key: &str) -> Result<bool> {
        let filter = doc! {
            "election_id": election_id,
            "voter_key": voter_key,
        };
        let count = self.ballots.count_documents(filter, None).await?;
        Ok(count > 0)
    }

    /// Unlike [`MemoryStore`](super::MemoryStore), this does not check that the
    /// election still exists; see [`Store::delete_election`] for the race.
    async fn insert_ballot(&self, ballot: &Ballot) -> std::result::Result<(), StoreError> {
        match self.ballots.insert_one(ballot, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key_error(&err) => Err(StoreError::Duplicate),
            Err(err) => Err(err.into()),
        }
    }

    async fn ballots(&self, election_id: Id) -> Result<Vec<Ballot>> {
        let options = FindOptions::builder()
            .sort(doc! {"cast_at": 1, "_id": 1})
            .build();
        let ballots = self
            .ballots
            .find(doc! {"election_id": election_id}, options)
            .await?
            .try_collect()
            .await?;
        Ok(ballots)
    }

    async fn count_ballots(&self, election_id: Id) -> Result<u64> {
        let count = self
            .ballots
            .count_documents(doc! {"election_id": election_id}, None)
            .await?;
        Ok(count)
    }
}
