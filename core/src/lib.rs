pub mod address;
pub mod api;
pub mod contracts;
pub mod display;
pub mod errors;
pub mod rpc_provider;
pub mod settings;
pub mod shortcut;
pub mod staking;
pub mod tokens;
pub mod transfer;
pub mod tx_tracker;
pub mod units;
pub mod validation;
pub mod wallet;
