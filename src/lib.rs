pub mod cache;
pub mod config;
pub mod error;
pub mod history;
pub mod history_store;
pub mod ht_validation;
pub mod http_client;
pub mod logging;
pub mod penalty;
pub mod player_props;
pub mod rate;
pub mod signal;
pub mod tiers;
pub mod upstream;
pub mod window;
