//! Contracts of the collaborators the deposit pipeline consumes. Every
//! method is read-only except [`KeyVault::create_validator_key`],
//! [`KeyVault::persist`] and [`TransactionSubmitter::submit_or_serialize`].
#![allow(async_fn_in_trait)]

use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use eyre::Result;

use super::{
    address::AddressTemplate,
    data::ValidatorKey,
    types::{
        BlsPublicKey, DepositCall, DepositType, GasInfo, NetworkConfig, NetworkIdentity,
        SubmittedTransaction, TransactionParams, ValidatorStatus,
    },
};

pub trait AccountLedger {
    async fn balance_of(&self, address: Address) -> Result<U256>;
    async fn sequence_number_of(&self, address: Address) -> Result<u64>;
}

pub trait ProtocolState {
    async fn node_exists(&self, node: Address) -> Result<bool>;
    async fn deposits_enabled(&self) -> Result<bool>;
    async fn stake_limit_of(&self, node: Address) -> Result<u64>;
    async fn stake_count_of(&self, node: Address) -> Result<u64>;
    async fn unbonded_max_count(&self) -> Result<u64>;
    async fn unbonded_count_of(&self, node: Address) -> Result<u64>;
    async fn is_trusted_member(&self, node: Address) -> Result<bool>;
    /// Whether the oracle DAO agrees on the latest network prices
    async fn prices_in_consensus(&self) -> Result<bool>;
    async fn deposit_type(&self, amount_wei: U256) -> Result<DepositType>;
    async fn address_template(&self) -> Result<AddressTemplate>;
    async fn withdrawal_credentials_of(&self, minipool: Address) -> Result<B256>;
    /// Network and deposit contract as registered with the protocol
    async fn deposit_network(&self) -> Result<NetworkIdentity>;
    async fn scrub_period(&self) -> Result<Duration>;
}

pub trait ConsensusStatus {
    async fn network_config(&self) -> Result<NetworkConfig>;
    /// Whether the consensus client is healthy enough to rely on
    async fn in_consensus(&self) -> Result<bool>;
    async fn validator_status(&self, pubkey: &BlsPublicKey) -> Result<ValidatorStatus>;
    async fn network_identity(&self) -> Result<NetworkIdentity>;
}

pub trait KeyVault {
    fn account_address(&self) -> Result<Address>;
    /// The key `create_validator_key` would return, without creating it
    fn next_validator_key(&self) -> Result<ValidatorKey>;
    /// Creates a key in memory only, nothing is written until `persist`
    fn create_validator_key(&mut self) -> Result<ValidatorKey>;
    /// Durably saves all key material created since the last save
    fn persist(&mut self) -> Result<()>;
    fn transaction_params(&self, value: U256) -> Result<TransactionParams>;
}

pub trait TransactionSubmitter {
    async fn estimate_gas(&self, params: &TransactionParams, call: &DepositCall) -> Result<GasInfo>;
    /// Broadcasts the deposit, or only signs and serializes it when
    /// `params.no_send` is set
    async fn submit_or_serialize(
        &self,
        params: &TransactionParams,
        call: &DepositCall,
    ) -> Result<SubmittedTransaction>;
}
