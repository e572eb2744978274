//! Ballot encryption at rest.
//!
//! Choices are sealed with AES-256-GCM under a single process-wide key.
//! Each ballot gets a fresh random nonce, and the election ID is bound in as
//! associated data so a ciphertext cannot be moved between elections.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use data_encoding::HEXLOWER;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::model::mongodb::Id;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("Secret `{0}` is missing or empty")]
    MissingSecret(&'static str),
    #[error("Derived key has the wrong length")]
    KeyLength,
    #[error("Failed to encrypt ballot")]
    Encrypt,
    #[error("Failed to decrypt ballot")]
    Decrypt,
    #[error("Ballot field is not valid hex: {0}")]
    Encoding(#[from] data_encoding::DecodeError),
    #[error("Ballot nonce must be {NONCE_LEN} bytes, got {0}")]
    NonceLength(usize),
    #[error("Decrypted ballot does not contain a candidate ID")]
    Plaintext,
}

/// A candidate choice in sealed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedChoice {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
}

impl SealedChoice {
    /// Rebuild a sealed choice from its hex-encoded stored form.
    pub fn from_hex(ciphertext: &str, nonce: &str) -> Result<Self, CipherError> {
        let ciphertext = HEXLOWER.decode(ciphertext.as_bytes())?;
        let nonce_bytes = HEXLOWER.decode(nonce.as_bytes())?;
        let nonce = nonce_bytes
            .as_slice()
            .try_into()
            .map_err(|_| CipherError::NonceLength(nonce_bytes.len()))?;
        Ok(Self { ciphertext, nonce })
    }

    pub fn ciphertext_hex(&self) -> String {
        HEXLOWER.encode(&self.ciphertext)
    }

    pub fn nonce_hex(&self) -> String {
        HEXLOWER.encode(&self.nonce)
    }
}

/// The process-wide ballot key.
pub struct BallotKey {
    cipher: Aes256Gcm,
}

impl BallotKey {
    /// Derive the key from the configured secret: the first [`KEY_LEN`]
    /// bytes of its SHA-256 digest.
    pub fn derive(secret: &str) -> Result<Self, CipherError> {
        if secret.is_empty() {
            return Err(CipherError::MissingSecret("ballot_secret"));
        }
        let digest = Sha256::digest(secret.as_bytes());
        let cipher =
            Aes256Gcm::new_from_slice(&digest[..KEY_LEN]).map_err(|_| CipherError::KeyLength)?;
        Ok(Self { cipher })
    }

    /// Seal a choice of candidate in the given election under a fresh random nonce.
    pub fn seal(&self, election_id: Id, candidate_id: Id) -> Result<SealedChoice, CipherError> {
        let mut nonce = [0; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.seal_with_nonce(election_id, candidate_id, nonce)
    }

    fn seal_with_nonce(
        &self,
        election_id: Id,
        candidate_id: Id,
        nonce: [u8; NONCE_LEN],
    ) -> Result<SealedChoice, CipherError> {
        let plaintext = candidate_id.to_string();
        let aad = election_id.to_bytes();
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: &aad,
                },
            )
            .map_err(|_| CipherError::Encrypt)?;
        Ok(SealedChoice { ciphertext, nonce })
    }

    /// Recover the candidate ID from a sealed choice.
    ///
    /// Fails if the key, nonce or election do not match those it was sealed with.
    pub fn open(&self, election_id: Id, sealed: &SealedChoice) -> Result<Id, CipherError> {
        let aad = election_id.to_bytes();
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(&sealed.nonce),
                Payload {
                    msg: &sealed.ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| CipherError::Decrypt)?;
        String::from_utf8(plaintext)
            .ok()
            .and_then(|s| s.parse::<Id>().ok())
            .ok_or(CipherError::Plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> BallotKey {
        BallotKey::derive("ballot secret for tests").unwrap()
    }

    #[test]
    fn round_trip_for_every_candidate() {
        let key = key();
        let election = Id::new();
        let candidates = (0..10).map(|_| Id::new()).collect::<Vec<_>>();
        for candidate in candidates {
            let sealed = key.seal(election, candidate).unwrap();
            assert_eq!(key.open(election, &sealed).unwrap(), candidate);
        }
    }

    #[test]
    fn identical_choices_seal_differently() {
        let key = key();
        let election = Id::new();
        let candidate = Id::new();
        let first = key.seal(election, candidate).unwrap();
        let second = key.seal(election, candidate).unwrap();
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn wrong_nonce_fails() {
        let key = key();
        let election = Id::new();
        let mut sealed = key.seal(election, Id::new()).unwrap();
        sealed.nonce[0] ^= 0xff;
        assert!(matches!(
            key.open(election, &sealed),
            Err(CipherError::Decrypt)
        ));
    }

    #[test]
    fn wrong_key_fails() {
        let election = Id::new();
        let sealed = key().seal(election, Id::new()).unwrap();
        let other = BallotKey::derive("some other secret").unwrap();
        assert!(matches!(
            other.open(election, &sealed),
            Err(CipherError::Decrypt)
        ));
    }

    #[test]
    fn wrong_election_fails() {
        let key = key();
        let sealed = key.seal(Id::new(), Id::new()).unwrap();
        assert!(matches!(
            key.open(Id::new(), &sealed),
            Err(CipherError::Decrypt)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = key();
        let election = Id::new();
        let mut sealed = key.seal(election, Id::new()).unwrap();
        sealed.ciphertext[0] ^= 0x01;
        assert!(key.open(election, &sealed).is_err());
    }

    #[test]
    fn non_id_plaintext_is_rejected() {
        let key = key();
        let election = Id::new();
        let nonce = [7; NONCE_LEN];
        let ciphertext = key
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: b"not a candidate",
                    aad: &election.to_bytes(),
                },
            )
            .unwrap();
        let sealed = SealedChoice { ciphertext, nonce };
        assert!(matches!(
            key.open(election, &sealed),
            Err(CipherError::Plaintext)
        ));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            BallotKey::derive(""),
            Err(CipherError::MissingSecret("ballot_secret"))
        ));
    }

    #[test]
    fn hex_form_round_trips() {
        let key = key();
        let election = Id::new();
        let candidate = Id::new();
        let sealed = key
            .seal_with_nonce(election, candidate, [1; NONCE_LEN])
            .unwrap();
        let restored = SealedChoice::from_hex(&sealed.ciphertext_hex(), &sealed.nonce_hex()).unwrap();
        assert_eq!(restored, sealed);
        assert_eq!(key.open(election, &restored).unwrap(), candidate);
    }

    #[test]
    fn malformed_hex_is_rejected() {
        assert!(matches!(
            SealedChoice::from_hex("zz", "00"),
            Err(CipherError::Encoding(_))
        ));
        assert!(matches!(
            SealedChoice::from_hex("00", "0000"),
            Err(CipherError::NonceLength(2))
        ));
    }
}
