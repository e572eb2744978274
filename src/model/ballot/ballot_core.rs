use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

use super::cipher::{CipherError, SealedChoice};

/// A cast ballot, as stored in the database. Never updated after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    /// Per-election pseudonym of the voter who cast this ballot.
    pub voter_key: String,
    /// Hex-encoded ciphertext of the chosen candidate ID.
    pub encrypted_choice: String,
    /// Hex-encoded nonce used to seal `encrypted_choice`.
    pub nonce: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

impl Ballot {
    pub fn new(
        election_id: Id,
        voter_key: String,
        sealed: &SealedChoice,
        cast_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Id::new(),
            election_id,
            voter_key,
            encrypted_choice: sealed.ciphertext_hex(),
            nonce: sealed.nonce_hex(),
            cast_at,
        }
    }

    /// The sealed choice, decoded from its stored form.
    pub fn sealed_choice(&self) -> Result<SealedChoice, CipherError> {
        SealedChoice::from_hex(&self.encrypted_choice, &self.nonce)
    }
}
