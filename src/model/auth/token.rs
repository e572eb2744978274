use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{
    errors::Error as JwtError, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use log::{debug, error};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token for a user with specific rights.
///
/// Tokens are issued by the account service; this server only verifies them.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U> {
    /// The user's identifier. For voters this is the voter identifier that
    /// eligibility and double-vote checks are made against.
    #[serde(rename = "sub")]
    pub subject: String,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    pub fn new(subject: impl Into<String>, rights: Rights) -> Self {
        Self {
            subject: subject.into(),
            rights,
            phantom: PhantomData,
        }
    }

    /// Encode this token as a signed JWT expiring at `expire_at`.
    pub fn into_jwt(self, secret: &[u8], expire_at: DateTime<Utc>) -> Result<String, JwtError> {
        let claims = Claims {
            token: self,
            expire_at,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret),
        )
    }

    /// Decode and verify a JWT.
    pub fn from_jwt(jwt: &str, secret: &[u8]) -> Result<Self, JwtError> {
        let token = jsonwebtoken::decode(
            jwt,
            &DecodingKey::from_secret(secret),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// Find the raw token, preferring the `Authorization` header over the cookie.
fn raw_token<'r>(req: &'r Request<'_>) -> Option<&'r str> {
    req.headers()
        .get_one("Authorization")
        .and_then(|header| header.strip_prefix("Bearer "))
        .or_else(|| req.cookies().get(AUTH_TOKEN_COOKIE).map(|cookie| cookie.value()))
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the request and check that it has the right
    /// rights for this user type.
    ///
    /// Missing or invalid tokens fail the request; valid tokens for another
    /// user type forward it.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.rocket().state::<Config>() {
            Some(config) => config,
            None => {
                error!("Config is not managed");
                return Outcome::Failure((
                    Status::InternalServerError,
                    Error::Unauthorized("Server is misconfigured".to_string()),
                ));
            }
        };

        let raw = match raw_token(req) {
            Some(raw) => raw,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Missing auth token".to_string()),
                ))
            }
        };

        let token = match Self::from_jwt(raw, config.jwt_secret()) {
            Ok(token) => token,
            Err(err) => {
                debug!("Rejected auth token: {err}");
                return Outcome::Failure((Status::Unauthorized, err.into()));
            }
        };

        if U::permits(token.rights) {
            Outcome::Success(token)
        } else {
            Outcome::Forward(())
        }
    }
}
