use std::path::PathBuf;

use alloy::primitives::{Address, U256};
use clap::{Parser, Subcommand};
use stakeflow_primitives::{
    ids::{BlsProofOfPossession, BlsPublicKey, DelegationId, NodeId, ValidationId},
    operation::OperationKey,
    TxHash,
};

#[derive(Parser)]
#[command(name = "stakeflow-cli")]
#[command(version)]
#[command(about = "Moves validator and delegator stake across the execution and platform chains")]
pub(crate) struct Cli {
    #[arg(
        long,
        short = 'c',
        env = "STAKEFLOW_CONFIG",
        default_value = "config.toml",
        help = "path to the configuration file"
    )]
    pub(crate) config: PathBuf,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Commands {
    /// Initiates the registration of a validator.
    RegisterValidator(RegisterValidatorArgs),

    /// Initiates a delegation to an existing validator.
    AddDelegation(AddDelegationArgs),

    /// Initiates the removal of a validator.
    RemoveValidator(RemoveValidatorArgs),

    /// Initiates the removal of a delegation.
    RemoveDelegation(RemoveDelegationArgs),

    /// Aggregates signatures over an initiated operation's message.
    Sign(StepArgs),

    /// Submits a signed message to the platform chain and waits for its acknowledgement.
    Submit(StepArgs),

    /// Completes an operation on the execution chain with the platform's acknowledgement.
    Complete(StepArgs),

    /// Claims the delegation fees a validator has accrued.
    ClaimFees(ClaimFeesArgs),

    /// Shows persisted operations.
    Status(StatusArgs),

    /// Looks up the receipt of an execution-chain transaction without waiting.
    CheckTx(CheckTxArgs),
}

#[derive(Parser, Debug, Clone)]
pub(crate) struct OutputArgs {
    #[arg(long, help = "file to write the step's artifact to, as JSON")]
    pub(crate) out: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub(crate) struct RegisterValidatorArgs {
    #[arg(long, help = "platform-chain node ID, hex encoded")]
    pub(crate) node_id: NodeId,

    #[arg(long, help = "compressed BLS public key of the node, hex encoded")]
    pub(crate) bls_public_key: BlsPublicKey,

    #[arg(long, help = "BLS proof of possession, hex encoded")]
    pub(crate) bls_pop: BlsProofOfPossession,

    #[arg(long, help = "stake to lock, in wei")]
    pub(crate) stake: U256,

    #[arg(long, help = "minimum time the stake stays locked, in seconds")]
    pub(crate) min_stake_duration: u64,

    #[arg(long, default_value_t = 200, help = "fee charged to delegators, in basis points")]
    pub(crate) delegation_fee_bips: u16,

    #[arg(long, help = "recipient of validation rewards (defaults to the signing account)")]
    pub(crate) reward_recipient: Option<Address>,

    #[command(flatten)]
    pub(crate) output: OutputArgs,
}

#[derive(Parser, Debug, Clone)]
pub(crate) struct AddDelegationArgs {
    #[arg(long, help = "validator to delegate to")]
    pub(crate) validation_id: ValidationId,

    #[arg(long, help = "stake to delegate, in wei")]
    pub(crate) stake: U256,

    #[arg(long, help = "recipient of delegation rewards (defaults to the signing account)")]
    pub(crate) reward_recipient: Option<Address>,

    #[command(flatten)]
    pub(crate) output: OutputArgs,
}

#[derive(Parser, Debug, Clone)]
pub(crate) struct RemoveValidatorArgs {
    #[arg(long, help = "validator to remove")]
    pub(crate) validation_id: ValidationId,

    #[arg(long, help = "attach a signed uptime proof so rewards are paid out")]
    pub(crate) uptime_proof: bool,

    #[command(flatten)]
    pub(crate) output: OutputArgs,
}

#[derive(Parser, Debug, Clone)]
pub(crate) struct RemoveDelegationArgs {
    #[arg(long, help = "delegation to remove")]
    pub(crate) delegation_id: DelegationId,

    #[arg(long, help = "attach a signed uptime proof of the delegated validator")]
    pub(crate) uptime_proof: bool,

    #[command(flatten)]
    pub(crate) output: OutputArgs,
}

#[derive(Parser, Debug, Clone)]
pub(crate) struct StepArgs {
    #[arg(long, help = "artifact of the previous step, as written by --out")]
    pub(crate) artifact: PathBuf,

    #[command(flatten)]
    pub(crate) output: OutputArgs,
}

#[derive(Parser, Debug, Clone)]
pub(crate) struct ClaimFeesArgs {
    #[arg(long, help = "validator whose delegation fees to claim")]
    pub(crate) validation_id: ValidationId,
}

#[derive(Parser, Debug, Clone)]
pub(crate) struct StatusArgs {
    #[arg(
        long,
        help = "operation key, e.g. `validation:0x..` (lists pending operations when omitted)"
    )]
    pub(crate) key: Option<OperationKey>,
}

#[derive(Parser, Debug, Clone)]
pub(crate) struct CheckTxArgs {
    #[arg(long, help = "execution-chain transaction hash")]
    pub(crate) tx_hash: TxHash,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_a_removal_with_uptime_proof() {
        let id = format!("0x{}", "11".repeat(32));
        let cli = Cli::try_parse_from([
            "stakeflow-cli",
            "--config",
            "custom.toml",
            "remove-validator",
            "--validation-id",
            id.as_str(),
            "--uptime-proof",
            "--out",
            "initiated.json",
        ])
        .expect("must parse");

        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        match cli.command {
            Commands::RemoveValidator(args) => {
                assert_eq!(args.validation_id, ValidationId::from([0x11u8; 32]));
                assert!(args.uptime_proof);
                assert_eq!(args.output.out, Some(PathBuf::from("initiated.json")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_a_malformed_operation_key() {
        let result = Cli::try_parse_from(["stakeflow-cli", "status", "--key", "bogus"]);
        assert!(result.is_err());
    }
}
