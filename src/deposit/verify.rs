use alloy::primitives::{B256, FixedBytes, hex};
use tree_hash::TreeHash;

use super::{
    data::{BLS_DST, DepositMessage},
    types::{BlsPublicKey, BlsSignature, NetworkConfig},
};

#[derive(Debug, tree_hash_derive::TreeHash)]
struct ForkData {
    current_version: FixedBytes<4>,
    genesis_validators_root: B256,
}

#[derive(Debug, tree_hash_derive::TreeHash)]
struct SigningData {
    object_root: B256,
    domain: B256,
}

/// domain_type ++ fork_data_root[..28]
pub fn compute_domain(
    domain_type: FixedBytes<4>,
    fork_version: FixedBytes<4>,
    genesis_validators_root: B256,
) -> B256 {
    let fork_data_root = ForkData {
        current_version: fork_version,
        genesis_validators_root,
    }
    .tree_hash_root();
    let mut domain = [0u8; 32];
    domain[..4].copy_from_slice(domain_type.as_slice());
    domain[4..].copy_from_slice(&fork_data_root[..28]);
    domain.into()
}

pub fn compute_signing_root(object_root: B256, domain: B256) -> B256 {
    SigningData {
        object_root,
        domain,
    }
    .tree_hash_root()
}

/// A deposit that did not pass verification, with every input hex encoded
/// so the check can be reproduced by hand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationFailure {
    pub reason: String,
    pub domain_type: String,
    pub fork_version: String,
    pub validators_root: String,
    pub amount: u64,
    pub pubkey: String,
    pub withdrawal_credentials: String,
    pub signature: String,
}

impl std::fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "deposit failed the validation safety check: {}\n\
             The deposit will not be submitted, no funds were moved.\n\
             \tDomain Type: {}\n\
             \tGenesis Fork Version: {}\n\
             \tGenesis Validator Root: {}\n\
             \tDeposit Amount: {} gwei\n\
             \tValidator Pubkey: {}\n\
             \tWithdrawal Credentials: {}\n\
             \tSignature: {}",
            self.reason,
            self.domain_type,
            self.fork_version,
            self.validators_root,
            self.amount,
            self.pubkey,
            self.withdrawal_credentials,
            self.signature,
        )
    }
}

impl std::error::Error for VerificationFailure {}

/// Rebuilds the deposit message from raw fields, recomputes the deposit
/// domain from `network` and checks the BLS signature against both.
/// Nothing produced by the deposit data builder is reused.
pub fn verify_deposit(
    network: &NetworkConfig,
    amount: u64,
    pubkey: &BlsPublicKey,
    withdrawal_credentials: &B256,
    signature: &BlsSignature,
) -> Result<(), VerificationFailure> {
    let fail = |reason: String| VerificationFailure {
        reason,
        domain_type: hex::encode_prefixed(network.domain_deposit),
        fork_version: hex::encode_prefixed(network.genesis_fork_version),
        validators_root: hex::encode_prefixed(network.genesis_validators_root),
        amount,
        pubkey: hex::encode_prefixed(pubkey),
        withdrawal_credentials: hex::encode_prefixed(withdrawal_credentials),
        signature: hex::encode_prefixed(signature),
    };

    let domain = compute_domain(
        network.domain_deposit,
        network.genesis_fork_version,
        network.genesis_validators_root,
    );
    let message = DepositMessage {
        pubkey: *pubkey,
        withdrawal_credentials: *withdrawal_credentials,
        amount,
    };
    let signing_root = compute_signing_root(message.tree_hash_root(), domain);

    let pk = blst::min_pk::PublicKey::key_validate(pubkey.as_slice())
        .map_err(|e| fail(format!("invalid public key ({:?})", e)))?;
    let sig = blst::min_pk::Signature::sig_validate(signature.as_slice(), true)
        .map_err(|e| fail(format!("invalid signature ({:?})", e)))?;

    match sig.verify(true, signing_root.as_slice(), BLS_DST, &[], &pk, true) {
        blst::BLST_ERROR::BLST_SUCCESS => Ok(()),
        e => Err(fail(format!("signature verification failed ({:?})", e))),
    }
}
