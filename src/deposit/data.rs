use alloy::primitives::B256;
use eyre::{Result, eyre};
use tree_hash::TreeHash;

use super::{
    types::{BlsPublicKey, BlsSignature, DEPOSIT_AMOUNT_GWEI, NetworkConfig},
    verify::{compute_domain, compute_signing_root},
};

// https://github.com/ethereum/consensus-specs/blob/dev/specs/phase0/beacon-chain.md#bls-signatures
pub const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// BLS12-381 validator secret key, held in memory only, together with the
/// public key it is known by (keystores record it next to the secret)
#[derive(Clone)]
pub struct ValidatorKey {
    secret: blst::min_pk::SecretKey,
    pubkey: BlsPublicKey,
}

impl std::fmt::Debug for ValidatorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ValidatorKey")
            .field("pubkey", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl From<blst::min_pk::SecretKey> for ValidatorKey {
    fn from(secret: blst::min_pk::SecretKey) -> Self {
        let pubkey = secret.sk_to_pk().compress().into();
        ValidatorKey { secret, pubkey }
    }
}

impl ValidatorKey {
    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        let secret = blst::min_pk::SecretKey::from_bytes(secret)
            .map_err(|e| eyre!("invalid validator secret key: {:?}", e))?;
        Ok(ValidatorKey::from(secret))
    }

    /// Key material as stored in a keystore, the recorded public key is
    /// taken as is and not checked against the secret
    pub fn from_keystore(secret: &[u8], pubkey: BlsPublicKey) -> Result<Self> {
        let key = ValidatorKey::from_bytes(secret)?;
        Ok(ValidatorKey { pubkey, ..key })
    }

    /// Key from input keying material (at least 32 bytes)
    pub fn from_ikm(ikm: &[u8]) -> Result<Self> {
        let secret = blst::min_pk::SecretKey::key_gen(ikm, &[])
            .map_err(|e| eyre!("validator key generation failed: {:?}", e))?;
        Ok(ValidatorKey::from(secret))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    pub fn public_key(&self) -> BlsPublicKey {
        self.pubkey
    }

    /// Whether the recorded public key belongs to the secret
    pub fn is_consistent(&self) -> bool {
        self.pubkey.0 == self.secret.sk_to_pk().compress()
    }

    pub fn sign(&self, message: &[u8]) -> BlsSignature {
        self.secret.sign(message, BLS_DST, &[]).compress().into()
    }
}

/// The part of the deposit covered by the signature
#[derive(Debug, Clone, PartialEq, Eq, tree_hash_derive::TreeHash)]
pub struct DepositMessage {
    pub pubkey: BlsPublicKey,
    pub withdrawal_credentials: B256,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, tree_hash_derive::TreeHash, serde::Serialize)]
pub struct DepositData {
    /// Validator public key
    pub pubkey: BlsPublicKey,
    /// Withdrawal credentials
    pub withdrawal_credentials: B256,
    /// Amount of ether deposited in gwei
    #[serde(with = "serde_utils::quoted_u64")]
    pub amount: u64,
    /// Deposit signature
    pub signature: BlsSignature,
}

impl DepositData {
    /// SSZ hash tree root, the `deposit_data_root` checked by the deposit contract
    pub fn data_root(&self) -> B256 {
        self.tree_hash_root()
    }
}

/// Signs a deposit of the protocol amount to `withdrawal_credentials`
pub fn build_deposit_data(
    key: &ValidatorKey,
    withdrawal_credentials: B256,
    network: &NetworkConfig,
) -> DepositData {
    let message = DepositMessage {
        pubkey: key.public_key(),
        withdrawal_credentials,
        amount: DEPOSIT_AMOUNT_GWEI,
    };
    let domain = compute_domain(
        network.domain_deposit,
        network.genesis_fork_version,
        network.genesis_validators_root,
    );
    let signing_root = compute_signing_root(message.tree_hash_root(), domain);
    DepositData {
        pubkey: message.pubkey,
        withdrawal_credentials: message.withdrawal_credentials,
        amount: message.amount,
        signature: key.sign(signing_root.as_slice()),
    }
}
