use alloy::primitives::{Address, TxHash};

use super::{types::NetworkIdentity, verify::VerificationFailure};

#[derive(Debug, thiserror::Error)]
pub enum DepositError {
    /// A ledger, protocol, consensus or wallet call failed
    #[error("{0:?}")]
    Collaborator(eyre::Report),

    #[error("node {0} is not registered with the protocol")]
    NodeNotRegistered(Address),

    #[error(
        "beacon network mismatch! Expected deposit contract {} on chain {}, \
         but the beacon node is using {} on chain {}",
        .local.deposit_contract,
        .local.chain_id,
        .beacon.deposit_contract,
        .beacon.chain_id
    )]
    NetworkMismatch {
        local: NetworkIdentity,
        beacon: NetworkIdentity,
    },

    #[error("error checking for existing validator status: {0:?}\nno funds were deposited")]
    ValidatorStatus(eyre::Report),

    #[error(
        "**** ALERT ****\n\
         Minipool {address} has the following as a validator pubkey:\n\t{pubkey}\n\
         This key is already in use by validator {index} on the beacon chain!\n\
         The deposit was refused so the validator is not slashed."
    )]
    DuplicateValidator {
        address: Address,
        pubkey: String,
        index: u64,
    },

    #[error(transparent)]
    Verification(Box<VerificationFailure>),

    #[error(
        "transaction {tx_hash} was accepted but saving the validator key failed: {cause:?}\n\
         Funds HAVE been deposited, back up the wallet before retrying anything"
    )]
    KeyPersistence {
        tx_hash: TxHash,
        cause: eyre::Report,
    },
}

impl From<eyre::Report> for DepositError {
    fn from(report: eyre::Report) -> Self {
        // Verification failures raised inside a concurrent group travel as reports
        match report.downcast::<VerificationFailure>() {
            Ok(failure) => DepositError::Verification(Box::new(failure)),
            Err(report) => DepositError::Collaborator(report),
        }
    }
}

impl From<VerificationFailure> for DepositError {
    fn from(failure: VerificationFailure) -> Self {
        DepositError::Verification(Box::new(failure))
    }
}

impl DepositError {
    /// Failures that must never be downgraded or retried automatically
    pub fn is_safety_critical(&self) -> bool {
        matches!(
            self,
            DepositError::NetworkMismatch { .. }
                | DepositError::DuplicateValidator { .. }
                | DepositError::Verification(_)
        )
    }

    /// True when the error happened after the deposit was broadcast
    pub fn funds_moved(&self) -> bool {
        matches!(self, DepositError::KeyPersistence { .. })
    }
}

pub type Result<T> = std::result::Result<T, DepositError>;
