//! Shared test helpers for the orchestrator crate.
//!
//! The simulated network from [`stakeflow_test_utils`] plays every collaborator; this module wires
//! it into a [`StakeContext`] backed by an in-memory store.

use std::sync::Arc;

use stakeflow_db::InMemoryOperationDb;
use stakeflow_params::StakeParams;
use stakeflow_test_utils::SimNetwork;

use crate::context::{ContextConfig, StakeContext};

/// A context whose every collaborator is the simulated network.
pub(crate) type SimContext =
    StakeContext<SimNetwork, SimNetwork, SimNetwork, SimNetwork, InMemoryOperationDb>;

/// Builds a context on `net` with default parameters and an empty store.
pub(crate) fn sim_context(net: &SimNetwork) -> Arc<SimContext> {
    sim_context_with_db(net, InMemoryOperationDb::default())
}

/// Builds a context on `net` over `db`, which other contexts may share as separate processes
/// would share a database file.
pub(crate) fn sim_context_with_db(net: &SimNetwork, db: InMemoryOperationDb) -> Arc<SimContext> {
    let config = net.config();
    let context_config = ContextConfig {
        params: StakeParams::default(),
        signing_subnet_id: config.subnet_id,
        network_id: config.network_id,
        source_chain_id: config.source_chain_id,
    };

    Arc::new(StakeContext::new(
        net.clone(),
        net.clone(),
        net.clone(),
        net.clone(),
        db,
        context_config,
    ))
}
