use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::ballot_box::BallotBox;
use crate::error::Result;
use crate::model::{
    api::{CastReceipt, CastRequest},
    auth::{AuthToken, Voter},
    mongodb::Id,
};

pub fn routes() -> Vec<Route> {
    routes![cast_ballot]
}

/// Cast the authenticated voter's ballot.
#[post("/elections/<election_id>/votes", data = "<request>", format = "json")]
async fn cast_ballot(
    token: AuthToken<Voter>,
    election_id: Id,
    request: Json<CastRequest>,
    ballot_box: &State<BallotBox>,
) -> Result<Json<CastReceipt>> {
    let receipt = ballot_box
        .cast(
            election_id,
            &token.subject,
            request.candidate_id.into(),
            Utc::now(),
        )
        .await?;
    Ok(Json(receipt))
}
