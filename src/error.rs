use jsonwebtoken::errors::Error as JwtError;
use log::{debug, error};
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::model::{
    ballot::CipherError,
    election::{ElectionStatus, Transition},
    mongodb::Id,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // Validation errors, raised before anything is written.
    #[error("Invalid dates: {0}")]
    InvalidDates(String),
    #[error("Invalid voter list: {0}")]
    InvalidVoterList(String),
    #[error("Candidate {0} is not standing in this election")]
    InvalidCandidate(Id),
    #[error("Voter is not eligible to vote in this election")]
    VoterNotEligible,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Jwt(#[from] JwtError),

    // State errors.
    #[error("Election {0} not found")]
    ElectionNotFound(Id),
    #[error("Cannot {transition} an election that is {status}")]
    InvalidTransition {
        transition: Transition,
        status: ElectionStatus,
    },
    #[error("Election is {0}, not running")]
    ElectionNotRunning(ElectionStatus),
    #[error("Results are not available while the election is {0}")]
    ResultsNotAvailable(ElectionStatus),
    #[error("Voter has already voted in this election")]
    AlreadyVoted,
    #[error("Election is {0} and can no longer be modified")]
    ElectionNotModifiable(ElectionStatus),

    // Infrastructure errors.
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    EncryptionFailure(#[from] CipherError),
}

/// Broad classes of [`Error`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is malformed or not allowed.
    Validation,
    /// The request conflicts with the current state of the election.
    State,
    /// Something went wrong underneath us.
    Infrastructure,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidDates(_)
            | Self::InvalidVoterList(_)
            | Self::InvalidCandidate(_)
            | Self::VoterNotEligible
            | Self::BadRequest(_)
            | Self::Unauthorized(_)
            | Self::Jwt(_) => ErrorClass::Validation,
            Self::ElectionNotFound(_)
            | Self::InvalidTransition { .. }
            | Self::ElectionNotRunning(_)
            | Self::ResultsNotAvailable(_)
            | Self::AlreadyVoted
            | Self::ElectionNotModifiable(_) => ErrorClass::State,
            Self::Db(_) | Self::EncryptionFailure(_) => ErrorClass::Infrastructure,
        }
    }

    /// May the caller retry the failed operation unchanged?
    ///
    /// Only infrastructure errors are transient. Even then, casting a ballot
    /// must not be blindly retried.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Infrastructure
    }

    /// Stable machine-readable name of this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDates(_) => "InvalidDates",
            Self::InvalidVoterList(_) => "InvalidVoterList",
            Self::InvalidCandidate(_) => "InvalidCandidate",
            Self::VoterNotEligible => "VoterNotEligible",
            Self::BadRequest(_) => "BadRequest",
            Self::Unauthorized(_) | Self::Jwt(_) => "Unauthorized",
            Self::ElectionNotFound(_) => "NotFound",
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::ElectionNotRunning(_) => "ElectionNotRunning",
            Self::ResultsNotAvailable(_) => "ResultsNotAvailable",
            Self::AlreadyVoted => "AlreadyVoted",
            Self::ElectionNotModifiable(_) => "ElectionNotModifiable",
            Self::Db(_) => "Db",
            Self::EncryptionFailure(_) => "EncryptionFailure",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::VoterNotEligible | Self::ResultsNotAvailable(_) => Status::Forbidden,
            Self::Unauthorized(_) | Self::Jwt(_) => Status::Unauthorized,
            Self::ElectionNotFound(_) => Status::NotFound,
            _ => match self.class() {
                ErrorClass::Validation => Status::BadRequest,
                ErrorClass::State => Status::Conflict,
                ErrorClass::Infrastructure => Status::InternalServerError,
            },
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ErrorBody {
    pub fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let message = match self.class() {
            ErrorClass::Infrastructure => {
                error!("{self}");
                "Internal server error".to_string()
            }
            _ => {
                debug!("{self}");
                self.to_string()
            }
        };
        let body = ErrorBody::new(self.kind(), message);
        (self.status(), Json(body)).respond_to(req)
    }
}
