use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::error::ErrorBody;

mod admin;
mod public;
mod voter;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voter::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![unauthorized, not_found, default_catcher]
}

/// A missing or invalid auth token.
#[catch(401)]
fn unauthorized() -> (Status, Json<ErrorBody>) {
    (
        Status::Unauthorized,
        Json(ErrorBody::new(
            "Unauthorized",
            "Missing or invalid auth token",
        )),
    )
}

/// No route matched, or every matching route forwarded.
#[catch(404)]
fn not_found(req: &Request) -> (Status, Json<ErrorBody>) {
    (
        Status::NotFound,
        Json(ErrorBody::new(
            "NotFound",
            format!("Nothing found at {}", req.uri()),
        )),
    )
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> (Status, Json<ErrorBody>) {
    let reason = status.reason().unwrap_or("Unknown error");
    (status, Json(ErrorBody::new("Error", reason)))
}

/// Helpers for driving the API from tests.
#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, Utc};
    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{self, Value},
    };

    use crate::model::{
        api::AdminElectionDescription,
        auth::{AuthToken, Rights},
        election::ElectionSpec,
    };

    /// An `Authorization` header carrying a valid token.
    pub fn bearer(subject: &str, rights: Rights) -> Header<'static> {
        let jwt = AuthToken::<()>::new(subject, rights)
            .into_jwt(
                crate::TEST_JWT_SECRET.as_bytes(),
                Utc::now() + Duration::hours(1),
            )
            .unwrap();
        Header::new("Authorization", format!("Bearer {jwt}"))
    }

    pub fn admin() -> Header<'static> {
        bearer("organizer", Rights::Admin)
    }

    pub fn voter(voter: &str) -> Header<'static> {
        bearer(voter, Rights::Voter)
    }

    pub async fn body(response: LocalResponse<'_>) -> Value {
        json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    /// Create an election through the API, returning its admin view.
    pub async fn create_election(client: &Client, spec: &ElectionSpec) -> AdminElectionDescription {
        let response = client
            .post("/elections")
            .header(ContentType::JSON)
            .header(admin())
            .body(json::to_string(spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        response.into_json().await.unwrap()
    }
}
