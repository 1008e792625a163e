//! Validated minipool deposits.
//!
//! Pure building blocks ([`address`], [`data`], [`verify`]) are free of side
//! effects and may be called any number of times. [`DepositPipeline`]
//! combines them with the collaborators in [`traits`]: `can_deposit` is a
//! read-only pre-flight, `deposit` is the single effectful sequence.

pub mod address;
pub mod credentials;
pub mod data;
pub mod error;
pub mod preflight;
pub mod submit;
pub mod traits;
pub mod types;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

use alloy::primitives::{Address, U256};
use colored::*;
use log::*;

use self::{
    data::DepositData,
    error::{DepositError, Result},
    traits::{AccountLedger, ConsensusStatus, ProtocolState, TransactionSubmitter},
    types::{DepositCall, DepositRequest, RequestedSalt, ResolvedSalt},
};

pub use self::{
    address::AddressTemplate,
    data::{ValidatorKey, build_deposit_data},
    error::DepositError as Error,
    types::*,
    verify::{VerificationFailure, compute_domain, verify_deposit},
};

pub struct DepositPipeline<L, P, C, S> {
    pub ledger: L,
    pub protocol: P,
    pub consensus: C,
    pub submitter: S,
}

impl<L, P, C, S> DepositPipeline<L, P, C, S>
where
    L: AccountLedger,
    P: ProtocolState,
    C: ConsensusStatus,
    S: TransactionSubmitter,
{
    pub fn new(ledger: L, protocol: P, consensus: C, submitter: S) -> Self {
        DepositPipeline {
            ledger,
            protocol,
            consensus,
            submitter,
        }
    }

    async fn require_registered(&self, node: Address) -> Result<()> {
        match self.protocol.node_exists(node).await? {
            true => Ok(()),
            false => Err(DepositError::NodeNotRegistered(node)),
        }
    }

    /// A zero salt becomes the node account's current transaction count
    async fn resolve_salt(&self, node: Address, salt: RequestedSalt) -> Result<ResolvedSalt> {
        let resolved = match salt {
            RequestedSalt::Explicit(salt) => ResolvedSalt(salt),
            RequestedSalt::Auto => {
                ResolvedSalt(U256::from(self.ledger.sequence_number_of(node).await?))
            }
        };
        debug!("salt: {}", resolved.value().to_string().magenta());
        Ok(resolved)
    }
}

/// Contract call arguments for a verified deposit
pub(crate) fn deposit_call(
    request: &DepositRequest,
    data: &DepositData,
    salt: ResolvedSalt,
    minipool: Address,
) -> eyre::Result<DepositCall> {
    Ok(DepositCall {
        min_node_fee: request.min_node_fee_wei()?,
        pubkey: data.pubkey,
        signature: data.signature,
        deposit_data_root: data.data_root(),
        salt: salt.value(),
        expected_minipool: minipool,
    })
}
