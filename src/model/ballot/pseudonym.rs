use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::model::mongodb::Id;

use super::cipher::CipherError;

pub type HmacSha256 = Hmac<Sha256>;

/// Turns voter identifiers into per-election pseudonyms, so ballots can be
/// deduplicated without storing who cast them.
#[derive(Clone)]
pub struct VoterPseudonymizer {
    mac: HmacSha256,
}

impl VoterPseudonymizer {
    pub fn new(secret: &str) -> Result<Self, CipherError> {
        if secret.is_empty() {
            return Err(CipherError::MissingSecret("hmac_secret"));
        }
        let mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| CipherError::KeyLength)?;
        Ok(Self { mac })
    }

    /// `HMAC-SHA256(secret, election_id || 0x00 || voter)`, hex encoded.
    pub fn voter_key(&self, election_id: Id, voter: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(&election_id.to_bytes());
        mac.update(&[0]);
        mac.update(voter.as_bytes());
        HEXLOWER.encode(&mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_stable_and_distinct() {
        let pseudonyms = VoterPseudonymizer::new("hmac secret").unwrap();
        let election = Id::new();

        let key = pseudonyms.voter_key(election, "v1@example.com");
        assert_eq!(key, pseudonyms.voter_key(election, "v1@example.com"));
        assert_eq!(key.len(), 64);
        assert!(!key.contains("v1"));

        assert_ne!(key, pseudonyms.voter_key(election, "v2@example.com"));
        assert_ne!(key, pseudonyms.voter_key(Id::new(), "v1@example.com"));

        let other = VoterPseudonymizer::new("other secret").unwrap();
        assert_ne!(key, other.voter_key(election, "v1@example.com"));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(VoterPseudonymizer::new("").is_err());
    }
}
