use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::ballot_box::BallotBox;
use crate::error::{Error, Result};
use crate::lifecycle::Lifecycle;
use crate::model::{
    api::{AdminElectionDescription, ElectionDescription, VoteCount},
    auth::{Admin, AuthToken, Voter},
    mongodb::Id,
};
use crate::tally::{Tally, TallyEngine};

pub fn routes() -> Vec<Route> {
    routes![
        elections_admin,
        elections_voter,
        election_admin,
        election_voter,
        vote_count_admin,
        vote_count_voter,
        results_admin,
        results_voter,
    ]
}

#[get("/elections", rank = 1)]
async fn elections_admin(
    _token: AuthToken<Admin>,
    lifecycle: &State<Lifecycle>,
) -> Result<Json<Vec<AdminElectionDescription>>> {
    let elections = lifecycle.list(Utc::now()).await?;
    Ok(Json(elections.iter().map(Into::into).collect()))
}

/// Elections the voter may take part in, each marked with whether they have voted.
#[get("/elections", rank = 2)]
async fn elections_voter(
    token: AuthToken<Voter>,
    lifecycle: &State<Lifecycle>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let elections = lifecycle.list(Utc::now()).await?;
    let visible = elections
        .iter()
        .filter(|election| election.is_eligible(&token.subject))
        .map(|election| ElectionDescription::for_voter(election, &token.subject))
        .collect();
    Ok(Json(visible))
}

#[get("/elections/<election_id>", rank = 1)]
async fn election_admin(
    _token: AuthToken<Admin>,
    election_id: Id,
    lifecycle: &State<Lifecycle>,
) -> Result<Json<AdminElectionDescription>> {
    let election = lifecycle.get(election_id, Utc::now()).await?;
    Ok(Json((&election).into()))
}

#[get("/elections/<election_id>", rank = 2)]
async fn election_voter(
    token: AuthToken<Voter>,
    election_id: Id,
    lifecycle: &State<Lifecycle>,
) -> Result<Json<ElectionDescription>> {
    let election = lifecycle.get(election_id, Utc::now()).await?;
    if !election.is_eligible(&token.subject) {
        return Err(Error::ElectionNotFound(election_id));
    }
    Ok(Json(ElectionDescription::for_voter(
        &election,
        &token.subject,
    )))
}

#[get("/elections/<election_id>/votes/count", rank = 1)]
async fn vote_count_admin(
    _token: AuthToken<Admin>,
    election_id: Id,
    ballot_box: &State<BallotBox>,
) -> Result<Json<VoteCount>> {
    let votes = ballot_box.vote_count(election_id, Utc::now()).await?;
    Ok(Json(VoteCount {
        election_id: election_id.into(),
        votes,
    }))
}

#[get("/elections/<election_id>/votes/count", rank = 2)]
async fn vote_count_voter(
    token: AuthToken<Voter>,
    election_id: Id,
    lifecycle: &State<Lifecycle>,
    ballot_box: &State<BallotBox>,
) -> Result<Json<VoteCount>> {
    ensure_visible(lifecycle, election_id, &token.subject).await?;
    let votes = ballot_box.vote_count(election_id, Utc::now()).await?;
    Ok(Json(VoteCount {
        election_id: election_id.into(),
        votes,
    }))
}

#[get("/elections/<election_id>/results", rank = 1)]
async fn results_admin(
    _token: AuthToken<Admin>,
    election_id: Id,
    tally: &State<TallyEngine>,
) -> Result<Json<Tally>> {
    Ok(Json(tally.tally(election_id, Utc::now()).await?))
}

#[get("/elections/<election_id>/results", rank = 2)]
async fn results_voter(
    token: AuthToken<Voter>,
    election_id: Id,
    lifecycle: &State<Lifecycle>,
    tally: &State<TallyEngine>,
) -> Result<Json<Tally>> {
    ensure_visible(lifecycle, election_id, &token.subject).await?;
    Ok(Json(tally.tally(election_id, Utc::now()).await?))
}

/// Restricted elections are invisible to voters not on the list.
async fn ensure_visible(lifecycle: &Lifecycle, election_id: Id, voter: &str) -> Result<()> {
    let election = lifecycle.get(election_id, Utc::now()).await?;
    if election.is_eligible(voter) {
        Ok(())
    } else {
        Err(Error::ElectionNotFound(election_id))
    }
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use crate::api::test_support::{admin, body, create_election, voter};
    use crate::model::election::ElectionSpec;

    use super::*;

    #[backend_test]
    async fn voters_only_see_their_elections(client: Client) {
        let open = create_election(&client, &ElectionSpec::current_example()).await;
        let restricted = create_election(&client, &ElectionSpec::restricted_example()).await;

        let response = client.get("/elections").header(admin()).dispatch().await;
        let all: Vec<AdminElectionDescription> = response.into_json().await.unwrap();
        assert_eq!(all.len(), 2);

        let response = client
            .get("/elections")
            .header(voter("v1@example.com"))
            .dispatch()
            .await;
        let listed: Vec<ElectionDescription> = response.into_json().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|e| e.has_voted == Some(false)));

        let response = client
            .get("/elections")
            .header(voter("v3@example.com"))
            .dispatch()
            .await;
        let listed: Vec<ElectionDescription> = response.into_json().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, open.election.id);

        let response = client
            .get(format!("/elections/{}", restricted.election.id))
            .header(voter("v3@example.com"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .get(format!("/elections/{}", restricted.election.id))
            .header(voter("v2@example.com"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let value = body(response).await;
        assert_eq!(value["has_voted"], false);
        assert!(value.get("allowed_voters").is_none());
    }

    #[backend_test]
    async fn listing_requires_a_token(client: Client) {
        let response = client.get("/elections").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(body(response).await["error"], "Unauthorized");
    }

    #[backend_test]
    async fn results_only_after_the_end(client: Client) {
        let created = create_election(&client, &ElectionSpec::current_example()).await;
        let id = created.election.id;

        let response = client
            .get(format!("/elections/{id}/results"))
            .header(voter("v1@example.com"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
        assert_eq!(body(response).await["error"], "ResultsNotAvailable");

        client
            .post(format!("/elections/{id}/end"))
            .header(admin())
            .dispatch()
            .await;

        let response = client
            .get(format!("/elections/{id}/results"))
            .header(voter("v1@example.com"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let tally: Tally = response.into_json().await.unwrap();
        assert_eq!(tally.total_ballots, 0);
        assert_eq!(tally.results.len(), 2);
        assert!(tally.results.iter().all(|result| result.votes == 0));
    }

    #[backend_test]
    async fn restricted_counts_and_results_hidden_from_other_voters(client: Client) {
        let created = create_election(&client, &ElectionSpec::restricted_example()).await;
        let id = created.election.id;

        let response = client
            .get(format!("/elections/{id}/votes/count"))
            .header(voter("v3@example.com"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(body(response).await["error"], "NotFound");

        let response = client
            .get(format!("/elections/{id}/votes/count"))
            .header(voter("v1@example.com"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(body(response).await["votes"], 0);

        let response = client
            .get(format!("/elections/{id}/votes/count"))
            .header(admin())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        client
            .post(format!("/elections/{id}/end"))
            .header(admin())
            .dispatch()
            .await;

        let response = client
            .get(format!("/elections/{id}/results"))
            .header(voter("v3@example.com"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        for header in [voter("v2@example.com"), admin()] {
            let response = client
                .get(format!("/elections/{id}/results"))
                .header(header)
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::Ok);
        }
    }

    #[backend_test]
    async fn unknown_elections_are_not_found(client: Client) {
        let id = Id::new();
        for uri in [
            format!("/elections/{id}"),
            format!("/elections/{id}/votes/count"),
            format!("/elections/{id}/results"),
        ] {
            let response = client.get(uri).header(admin()).dispatch().await;
            assert_eq!(response.status(), Status::NotFound);
        }
    }
}
