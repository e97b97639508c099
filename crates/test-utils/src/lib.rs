//! This crate provides a simulated two-chain network for testing the staking saga.
//!
//! [`SimNetwork`] plays the staking-manager contract, the execution chain's receipt source, the
//! signature aggregator, the validators' uptime endpoint and the platform chain, all over one
//! shared state so that tests can drive a saga end to end and inspect both ledgers.

mod aggregator;
pub mod fixtures;
mod network;
mod platform;

pub use network::{SimConfig, SimNetwork, PLATFORM_CHAIN_ID, REWARD_PER_SECOND};
