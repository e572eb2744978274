use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::ballot_box::BallotBox;
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::model::{
    api::{AdminElectionDescription, BallotRecord},
    auth::{Admin, AuthToken},
    election::ElectionSpec,
    mongodb::Id,
};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        modify_election,
        start_election,
        end_election,
        delete_election,
        election_ballots,
    ]
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    lifecycle: &State<Lifecycle>,
) -> Result<Json<AdminElectionDescription>> {
    let election = lifecycle.create(spec.into_inner(), Utc::now()).await?;
    Ok(Json((&election).into()))
}

#[put("/elections/<election_id>", data = "<spec>", format = "json")]
async fn modify_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    spec: Json<ElectionSpec>,
    lifecycle: &State<Lifecycle>,
) -> Result<Json<AdminElectionDescription>> {
    let election = lifecycle
        .modify(election_id, spec.into_inner(), Utc::now())
        .await?;
    Ok(Json((&election).into()))
}

#[post("/elections/<election_id>/start")]
async fn start_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    lifecycle: &State<Lifecycle>,
) -> Result<Json<AdminElectionDescription>> {
    let election = lifecycle.start(election_id, Utc::now()).await?;
    Ok(Json((&election).into()))
}

#[post("/elections/<election_id>/end")]
async fn end_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    lifecycle: &State<Lifecycle>,
) -> Result<Json<AdminElectionDescription>> {
    let election = lifecycle.end(election_id, Utc::now()).await?;
    Ok(Json((&election).into()))
}

#[delete("/elections/<election_id>")]
async fn delete_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    lifecycle: &State<Lifecycle>,
) -> Result<()> {
    lifecycle.delete(election_id).await
}

/// The sealed ballots of an election, for auditing.
#[get("/elections/<election_id>/ballots")]
async fn election_ballots(
    _token: AuthToken<Admin>,
    election_id: Id,
    ballot_box: &State<BallotBox>,
) -> Result<Json<Vec<BallotRecord>>> {
    let ballots = ballot_box.ballots(election_id, Utc::now()).await?;
    Ok(Json(ballots.into_iter().map(BallotRecord::from).collect()))
}
