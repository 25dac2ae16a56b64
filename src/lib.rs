pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod prompts;
pub mod routing;
pub mod schema;
pub mod session;
pub mod storage;
pub mod store;
pub mod transport;

#[cfg(test)]
mod fixtures;

use std::sync::Arc;

use crate::config::Config;
use crate::gateway::RequestGateway;
use crate::prompts::{Clock, SystemClock};
use crate::session::Session;
use crate::storage::FileStorage;
use crate::store::SessionStore;

pub use crate::error::{GuideError, Result};

/// Session backed by the file snapshot and the Gemini transport described by `cfg`
pub fn open_session(cfg: &Config) -> Session {
    let storage = Arc::new(FileStorage::new(cfg.data_dir()));
    let store = SessionStore::new(storage, cfg.storage.snapshot_key.clone());
    let gateway = RequestGateway::from_config(cfg);
    Session::new(store, gateway, SystemClock.today())
}
