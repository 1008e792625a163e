use std::time::Duration;

use alloy::primitives::{
    Address, B256, Bytes, FixedBytes, TxHash, U256,
    utils::{Unit, parse_ether},
};
use eyre::{Result, bail};
use serde_derive::Serialize;

/// Gwei amount carried by every initial validator deposit, independent
/// of the amount the node operator stakes
pub const DEPOSIT_AMOUNT_GWEI: u64 = 16_000_000_000;

// https://github.com/ethereum/consensus-specs/blob/dev/specs/phase0/beacon-chain.md#domain-types
pub const DOMAIN_DEPOSIT: [u8; 4] = [0x03, 0x00, 0x00, 0x00];

pub type BlsPublicKey = FixedBytes<48>;
pub type BlsSignature = FixedBytes<96>;

/// Salt as supplied by the caller, zero means "use the account nonce"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedSalt {
    Auto,
    Explicit(U256),
}

impl From<U256> for RequestedSalt {
    fn from(salt: U256) -> Self {
        match salt.is_zero() {
            true => RequestedSalt::Auto,
            false => RequestedSalt::Explicit(salt),
        }
    }
}

impl From<u64> for RequestedSalt {
    fn from(salt: u64) -> Self {
        RequestedSalt::from(U256::from(salt))
    }
}

/// Salt after auto-assignment, resolved exactly once per invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedSalt(pub U256);

impl ResolvedSalt {
    pub fn value(&self) -> U256 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct DepositRequest {
    /// Node stake in gwei
    pub amount_gwei: u64,
    /// Minimum commission the node accepts, fraction in [0, 1]
    pub min_node_fee: f64,
    pub salt: RequestedSalt,
    /// Broadcast (true) or only serialize the signed transaction (false)
    pub submit: bool,
    /// Override the account nonce
    pub nonce: Option<u64>,
}

impl DepositRequest {
    pub fn new(amount_gwei: u64, min_node_fee: f64, salt: RequestedSalt, submit: bool) -> Self {
        DepositRequest {
            amount_gwei,
            min_node_fee,
            salt,
            submit,
            nonce: None,
        }
    }

    pub fn with_nonce(mut self, nonce: Option<u64>) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn amount_wei(&self) -> U256 {
        U256::from(self.amount_gwei) * Unit::GWEI.wei()
    }

    pub fn is_zero_amount(&self) -> bool {
        self.amount_gwei == 0
    }

    /// Node fee as the 18 decimal fixed point value the contract expects
    pub fn min_node_fee_wei(&self) -> Result<U256> {
        if !(0.0..=1.0).contains(&self.min_node_fee) {
            bail!(
                "minimum node fee {} must be between 0 and 1",
                self.min_node_fee
            );
        }
        Ok(parse_ether(&self.min_node_fee.to_string())?)
    }
}

/// Genesis parameters the deposit signing domain is derived from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkConfig {
    pub genesis_fork_version: FixedBytes<4>,
    /// Deposits are valid before genesis so this is zero on every network
    pub genesis_validators_root: B256,
    pub domain_deposit: FixedBytes<4>,
}

impl NetworkConfig {
    pub fn new(genesis_fork_version: [u8; 4]) -> Self {
        NetworkConfig {
            genesis_fork_version: genesis_fork_version.into(),
            genesis_validators_root: B256::ZERO,
            domain_deposit: DOMAIN_DEPOSIT.into(),
        }
    }
}

/// Chain id and deposit contract a collaborator believes is authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkIdentity {
    pub chain_id: u64,
    pub deposit_contract: Address,
}

/// Deposit size class as reported by the protocol for a given stake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum DepositType {
    None = 0,
    Full = 1,
    Half = 2,
    Empty = 3,
}

impl DepositType {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for DepositType {
    type Error = eyre::Report;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DepositType::None),
            1 => Ok(DepositType::Full),
            2 => Ok(DepositType::Half),
            3 => Ok(DepositType::Empty),
            n => bail!("unknown deposit type {}", n),
        }
    }
}

/// Where the funds of a new deposit end up being controlled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DerivedTarget {
    pub address: Address,
    pub withdrawal_credentials: B256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidatorStatus {
    pub exists: bool,
    pub index: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GasInfo {
    pub estimated: u64,
    pub safe_limit: u64,
}

impl GasInfo {
    pub fn from_estimate(estimated: u64) -> Self {
        GasInfo {
            estimated,
            safe_limit: estimated.saturating_mul(3) / 2,
        }
    }
}

/// Arguments of the node deposit contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositCall {
    pub min_node_fee: U256,
    pub pubkey: BlsPublicKey,
    pub signature: BlsSignature,
    pub deposit_data_root: B256,
    pub salt: U256,
    pub expected_minipool: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionParams {
    pub from: Address,
    pub value: U256,
    pub nonce: Option<u64>,
    pub gas_limit: Option<u64>,
    /// Sign and serialize without broadcasting
    pub no_send: bool,
}

impl TransactionParams {
    pub fn new(from: Address, value: U256) -> Self {
        TransactionParams {
            from,
            value,
            nonce: None,
            gas_limit: None,
            no_send: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub hash: TxHash,
    pub raw: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreflightResult {
    pub insufficient_balance: bool,
    pub deposits_disabled: bool,
    pub insufficient_stake_headroom: bool,
    pub invalid_amount: bool,
    pub unbonded_limit_reached: bool,
    pub not_in_consensus: bool,
    pub salt: ResolvedSalt,
    pub target: DerivedTarget,
    pub gas: GasInfo,
}

impl PreflightResult {
    pub fn can_proceed(&self) -> bool {
        !(self.insufficient_balance
            || self.deposits_disabled
            || self.insufficient_stake_headroom
            || self.invalid_amount
            || self.unbonded_limit_reached
            || self.not_in_consensus)
    }

    /// Human readable reasons for a "no go", empty when the deposit may proceed
    pub fn reasons(&self) -> Vec<&'static str> {
        let mut reasons = Vec::new();
        if self.insufficient_balance {
            reasons.push("node balance is lower than the requested amount");
        }
        if self.deposits_disabled {
            reasons.push("node deposits are currently disabled");
        }
        if self.insufficient_stake_headroom {
            reasons.push("node stake does not allow another minipool");
        }
        if self.invalid_amount {
            reasons.push("only trusted nodes may deposit a zero amount");
        }
        if self.unbonded_limit_reached {
            reasons.push("trusted node reached its unbonded minipool limit");
        }
        if self.not_in_consensus {
            reasons.push("network is not in consensus");
        }
        reasons
    }

    pub fn report(&self) -> Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("can_proceed".to_string(), self.can_proceed().into());
        }
        Ok(value)
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub tx_hash: TxHash,
    pub target: DerivedTarget,
    pub pubkey: BlsPublicKey,
    pub salt: ResolvedSalt,
    /// Signed transaction bytes, only set for dry runs
    pub raw_transaction: Option<Bytes>,
    pub scrub_period: Duration,
}
