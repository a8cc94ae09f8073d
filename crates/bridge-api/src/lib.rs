//! bridge-api: HTTP API layer for the bridging service
//!
//! Validates inbound bridging requests, gates them on the validator-change
//! tracker and hands them to the per-chain transaction builders.

pub mod bridging_addresses;
pub mod dto;
pub mod routes;
pub mod server;
pub mod state;
pub mod validate;
pub mod validator_change;

pub use bridging_addresses::BridgingAddresses;
pub use server::*;
pub use state::AppState;
pub use validate::{validate_bridging_request, ValidatedBridgingRequest};
pub use validator_change::{
    AddressRefresher, HttpValidatorChangeSource, StaticValidatorChangeSource, TrackerError,
    ValidatorChangeSource, ValidatorChangeState, ValidatorChangeTracker,
};
