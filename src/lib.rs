#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{figment::Figment, Build, Rocket};

pub mod api;
pub mod ballot_box;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod store;
pub mod tally;

pub use config::Config;

use config::{ConfigFairing, CoreFairing, DatabaseFairing};
use logging::LoggerFairing;
use store::SharedStore;

/// Build the server over MongoDB, configured from `Rocket.toml` and the environment.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(CoreFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// Build the server over an existing store, skipping the database connection.
pub fn rocket_for_store(figment: Figment, store: SharedStore) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(store)
        .attach(CoreFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

#[cfg(test)]
pub(crate) const TEST_JWT_SECRET: &str = "test jwt secret";

/// A server over the given in-memory store, with fixed test secrets.
#[cfg(test)]
pub(crate) fn rocket_for_tests(store: std::sync::Arc<store::MemoryStore>) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("ballot_secret", "test ballot secret"))
        .merge(("hmac_secret", "test hmac secret"))
        .merge(("jwt_secret", TEST_JWT_SECRET))
        .merge(("min_election_duration", 15 * 60))
        .merge(("log_level", "off"));
    rocket_for_store(figment, store)
}
