use std::sync::Arc;

use chrono::Duration;
use log::{error, info};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::ballot_box::BallotBox;
use crate::lifecycle::Lifecycle;
use crate::model::ballot::{BallotKey, CipherError, VoterPseudonymizer};
use crate::store::{MongoStore, SharedStore};
use crate::tally::TallyEngine;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_min_election_duration")]
    min_election_duration: u32,
    // secrets
    ballot_secret: String,
    hmac_secret: String,
    jwt_secret: String,
}

fn default_min_election_duration() -> u32 {
    15 * 60
}

impl Config {
    /// Shortest permitted voting window, in seconds. Zero disables the check.
    pub fn min_election_duration(&self) -> Duration {
        Duration::seconds(self.min_election_duration.into())
    }

    /// Secret key used to verify JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Derive the ballot encryption key.
    pub fn ballot_key(&self) -> Result<BallotKey, CipherError> {
        BallotKey::derive(&self.ballot_secret)
    }

    /// Build the voter pseudonym generator.
    pub fn voter_pseudonymizer(&self) -> Result<VoterPseudonymizer, CipherError> {
        VoterPseudonymizer::new(&self.hmac_secret)
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: String,
}

fn default_db_name() -> String {
    "elections".to_string()
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places a [`SharedStore`] into managed
/// state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Ensure the required indexes exist.
        let store = match MongoStore::new(client, &db).await {
            Ok(store) => store,
            Err(e) => {
                error!("Failed to set up database: {e}");
                return Err(rocket);
            }
        };
        info!("...database connection online!");

        // Manage the state.
        let store: SharedStore = Arc::new(store);
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// A fairing that derives the ballot key and voter pseudonymizer from the
/// config and builds the core services over the managed [`SharedStore`].
///
/// Must be attached after [`ConfigFairing`] and after the store is managed.
pub struct CoreFairing;

#[rocket::async_trait]
impl Fairing for CoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election core",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (config, store) = match (rocket.state::<Config>(), rocket.state::<SharedStore>()) {
            (Some(config), Some(store)) => (config, store.clone()),
            _ => {
                error!("Election core requires the config and a store");
                return Err(rocket);
            }
        };

        // Key material problems are fatal at startup, never per request.
        let keys = config
            .ballot_key()
            .and_then(|key| Ok((key, config.voter_pseudonymizer()?)));
        let (key, pseudonyms) = match keys {
            Ok((key, pseudonyms)) => (Arc::new(key), Arc::new(pseudonyms)),
            Err(e) => {
                error!("Failed to derive ballot keys: {e}");
                return Err(rocket);
            }
        };
        let lifecycle = Lifecycle::new(store.clone(), config.min_election_duration());
        info!(
            "Election core ready, minimum election duration {}s",
            config.min_election_duration().num_seconds()
        );

        let ballot_box = BallotBox::new(lifecycle.clone(), store.clone(), key.clone(), pseudonyms);
        let tally = TallyEngine::new(lifecycle.clone(), store, key);
        Ok(rocket.manage(lifecycle).manage(ballot_box).manage(tally))
    }
}
