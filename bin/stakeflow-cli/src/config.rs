//! Configuration of the CLI, read from a TOML file.

use std::{fs, path::Path, path::PathBuf};

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use stakeflow_db::DbConfig;
use stakeflow_orchestrator::ContextConfig;
use stakeflow_params::StakeParams;
use stakeflow_primitives::ids::{ChainId, SubnetId};
use tracing::{debug, trace};

/// Environment variable the signing key is read from unless configured otherwise.
const DEFAULT_PRIVATE_KEY_ENV: &str = "STAKEFLOW_PRIVATE_KEY";

/// Endpoints, chain identities and saga parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Config {
    /// JSON-RPC endpoint of the execution chain.
    pub(crate) execution_rpc_url: String,

    /// Address of the staking manager contract.
    pub(crate) staking_manager: Address,

    /// Base URL of the signature aggregator.
    pub(crate) aggregator_url: String,

    /// JSON-RPC endpoint of the platform chain.
    pub(crate) platform_rpc_url: String,

    /// JSON-RPC endpoint serving validator uptime.
    pub(crate) uptime_rpc_url: String,

    /// Subnet whose validators sign the execution chain's messages.
    pub(crate) signing_subnet_id: SubnetId,

    /// Network both chains belong to.
    pub(crate) network_id: u32,

    /// Chain ID of the execution chain, as warp messages name it.
    pub(crate) source_chain_id: ChainId,

    /// SQLite file holding the operation records.
    pub(crate) db_path: PathBuf,

    /// Environment variable holding the hex-encoded signing key.
    #[serde(default = "default_private_key_env")]
    pub(crate) private_key_env: String,

    /// Retry policy of the database.
    #[serde(default)]
    pub(crate) db: DbConfig,

    /// Quorums and waiting budgets.
    #[serde(default)]
    pub(crate) params: StakeParams,
}

fn default_private_key_env() -> String {
    DEFAULT_PRIVATE_KEY_ENV.to_string()
}

impl Config {
    /// Reads and parses the config file at `path`.
    pub(crate) fn load(path: impl AsRef<Path>) -> Result<Self> {
        parse_toml(path)
    }

    /// The part of the config the orchestrators need.
    pub(crate) fn context_config(&self) -> ContextConfig {
        ContextConfig {
            params: self.params.clone(),
            signing_subnet_id: self.signing_subnet_id,
            network_id: self.network_id,
            source_chain_id: self.source_chain_id,
        }
    }
}

fn parse_toml<T>(path: impl AsRef<Path>) -> Result<T>
where
    T: std::fmt::Debug + DeserializeOwned,
{
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    trace!(%raw, "read file");

    let parsed = toml::from_str::<T>(&raw)
        .with_context(|| format!("failed to parse TOML file {}", path.display()))?;
    debug!(?parsed, "parsed TOML file");

    Ok(parsed)
}
