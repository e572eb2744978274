pub use ballot_core::Ballot;
pub use cipher::{BallotKey, CipherError, SealedChoice, KEY_LEN, NONCE_LEN};
pub use pseudonym::{HmacSha256, VoterPseudonymizer};

mod ballot_core;
mod cipher;
mod pseudonym;
