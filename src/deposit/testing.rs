//! In-memory collaborators for exercising the pipeline without a network

use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, B256, Bytes, TxHash, U256, keccak256, utils::parse_ether};
use eyre::{Result, bail};
use tokio::sync::Barrier;

use super::{
    DepositPipeline,
    address::AddressTemplate,
    data::ValidatorKey,
    traits::{AccountLedger, ConsensusStatus, KeyVault, ProtocolState, TransactionSubmitter},
    types::*,
};
use crate::parse_address;

pub fn owner() -> Address {
    parse_address!("0x28eb85aa9c01011fe9f62aee4c4446db069bc753")
}

pub fn deposit_contract() -> Address {
    parse_address!("0x4242424242424242424242424242424242424242")
}

pub fn template() -> AddressTemplate {
    AddressTemplate::new(
        parse_address!("0x6293B8abC1F36aFB22406Be5f96D893072A8cF3a"),
        parse_address!("0x594Fb75D3dc2DFa0150Ad03F99F97817747dd4E1"),
        Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52, 0x34, 0x80, 0x15, 0x61, 0x00]),
    )
}

fn network() -> NetworkIdentity {
    NetworkIdentity {
        chain_id: 17000,
        deposit_contract: deposit_contract(),
    }
}

macro_rules! fail_on {
    ($self:ident, $name:literal) => {
        if $self.fail == Some($name) {
            bail!("{} failed: connection refused", $name);
        }
    };
}

/// Parks the call until every other holder of the barrier arrives
async fn rendezvous(barrier: &Option<Arc<Barrier>>) {
    if let Some(barrier) = barrier {
        barrier.wait().await;
    }
}

pub struct MockLedger {
    pub balance: U256,
    pub nonce: u64,
    /// Shared with another mock to require overlapping calls
    pub barrier: Option<Arc<Barrier>>,
    pub fail: Option<&'static str>,
}

impl Default for MockLedger {
    fn default() -> Self {
        MockLedger {
            balance: parse_ether("32").unwrap(),
            nonce: 11,
            barrier: None,
            fail: None,
        }
    }
}

impl AccountLedger for MockLedger {
    async fn balance_of(&self, _address: Address) -> Result<U256> {
        fail_on!(self, "balance_of");
        rendezvous(&self.barrier).await;
        Ok(self.balance)
    }

    async fn sequence_number_of(&self, _address: Address) -> Result<u64> {
        fail_on!(self, "sequence_number_of");
        Ok(self.nonce)
    }
}

pub struct MockProtocol {
    pub registered: bool,
    pub deposits_enabled: bool,
    pub stake_limit: u64,
    pub stake_count: u64,
    pub unbonded_max: u64,
    pub unbonded_count: u64,
    pub trusted: bool,
    pub prices_in_consensus: bool,
    pub network: NetworkIdentity,
    pub barrier: Option<Arc<Barrier>>,
    pub fail: Option<&'static str>,
}

impl Default for MockProtocol {
    fn default() -> Self {
        MockProtocol {
            registered: true,
            deposits_enabled: true,
            stake_limit: 3,
            stake_count: 1,
            unbonded_max: 5,
            unbonded_count: 0,
            trusted: false,
            prices_in_consensus: true,
            network: network(),
            barrier: None,
            fail: None,
        }
    }
}

impl MockProtocol {
    /// 0x01 credentials pointing at the minipool
    pub fn credentials_for(minipool: Address) -> B256 {
        let mut creds = [0u8; 32];
        creds[0] = 0x01;
        creds[12..].copy_from_slice(minipool.as_slice());
        creds.into()
    }
}

impl ProtocolState for MockProtocol {
    async fn node_exists(&self, _node: Address) -> Result<bool> {
        fail_on!(self, "node_exists");
        Ok(self.registered)
    }

    async fn deposits_enabled(&self) -> Result<bool> {
        fail_on!(self, "deposits_enabled");
        rendezvous(&self.barrier).await;
        Ok(self.deposits_enabled)
    }

    async fn stake_limit_of(&self, _node: Address) -> Result<u64> {
        fail_on!(self, "stake_limit_of");
        Ok(self.stake_limit)
    }

    async fn stake_count_of(&self, _node: Address) -> Result<u64> {
        fail_on!(self, "stake_count_of");
        Ok(self.stake_count)
    }

    async fn unbonded_max_count(&self) -> Result<u64> {
        fail_on!(self, "unbonded_max_count");
        Ok(self.unbonded_max)
    }

    async fn unbonded_count_of(&self, _node: Address) -> Result<u64> {
        fail_on!(self, "unbonded_count_of");
        Ok(self.unbonded_count)
    }

    async fn is_trusted_member(&self, _node: Address) -> Result<bool> {
        fail_on!(self, "is_trusted_member");
        Ok(self.trusted)
    }

    async fn prices_in_consensus(&self) -> Result<bool> {
        fail_on!(self, "prices_in_consensus");
        Ok(self.prices_in_consensus)
    }

    async fn deposit_type(&self, amount_wei: U256) -> Result<DepositType> {
        fail_on!(self, "deposit_type");
        Ok(match amount_wei {
            a if a.is_zero() => DepositType::Empty,
            a if a == parse_ether("16")? => DepositType::Half,
            a if a == parse_ether("32")? => DepositType::Full,
            _ => DepositType::None,
        })
    }

    async fn address_template(&self) -> Result<AddressTemplate> {
        fail_on!(self, "address_template");
        Ok(template())
    }

    async fn withdrawal_credentials_of(&self, minipool: Address) -> Result<B256> {
        fail_on!(self, "withdrawal_credentials_of");
        Ok(MockProtocol::credentials_for(minipool))
    }

    async fn deposit_network(&self) -> Result<NetworkIdentity> {
        fail_on!(self, "deposit_network");
        Ok(self.network)
    }

    async fn scrub_period(&self) -> Result<Duration> {
        fail_on!(self, "scrub_period");
        Ok(Duration::from_secs(12 * 60 * 60))
    }
}

pub struct MockConsensus {
    pub fork_version: [u8; 4],
    pub in_consensus: bool,
    /// Index of an already active validator using the queried key
    pub existing_validator: Option<u64>,
    pub network: NetworkIdentity,
    pub fail: Option<&'static str>,
}

impl Default for MockConsensus {
    fn default() -> Self {
        MockConsensus {
            fork_version: [0x01, 0x01, 0x70, 0x00],
            in_consensus: true,
            existing_validator: None,
            network: network(),
            fail: None,
        }
    }
}

impl ConsensusStatus for MockConsensus {
    async fn network_config(&self) -> Result<NetworkConfig> {
        fail_on!(self, "network_config");
        Ok(NetworkConfig::new(self.fork_version))
    }

    async fn in_consensus(&self) -> Result<bool> {
        fail_on!(self, "in_consensus");
        Ok(self.in_consensus)
    }

    async fn validator_status(&self, _pubkey: &BlsPublicKey) -> Result<ValidatorStatus> {
        fail_on!(self, "validator_status");
        Ok(ValidatorStatus {
            exists: self.existing_validator.is_some(),
            index: self.existing_validator.unwrap_or_default(),
        })
    }

    async fn network_identity(&self) -> Result<NetworkIdentity> {
        fail_on!(self, "network_identity");
        Ok(self.network)
    }
}

/// Keys are derived from the index, the index only advances on `persist`
#[derive(Default)]
pub struct MockVault {
    pub next_index: u8,
    pub pending: Option<ValidatorKey>,
    pub persisted: Vec<BlsPublicKey>,
    /// Hand out keys whose recorded public key belongs to another secret
    pub tampered: bool,
    pub fail: Option<&'static str>,
}

impl MockVault {
    fn key_at(&self, index: u8) -> Result<ValidatorKey> {
        let key = ValidatorKey::from_ikm(&[index + 1; 32])?;
        match self.tampered {
            false => Ok(key),
            true => {
                let other = ValidatorKey::from_ikm(&[index + 101; 32])?;
                ValidatorKey::from_keystore(&key.to_bytes(), other.public_key())
            }
        }
    }
}

impl KeyVault for MockVault {
    fn account_address(&self) -> Result<Address> {
        fail_on!(self, "account_address");
        Ok(owner())
    }

    fn next_validator_key(&self) -> Result<ValidatorKey> {
        fail_on!(self, "next_validator_key");
        self.key_at(self.next_index)
    }

    fn create_validator_key(&mut self) -> Result<ValidatorKey> {
        fail_on!(self, "create_validator_key");
        let key = self.key_at(self.next_index)?;
        self.pending = Some(key.clone());
        Ok(key)
    }

    fn persist(&mut self) -> Result<()> {
        fail_on!(self, "persist");
        if let Some(key) = self.pending.take() {
            self.persisted.push(key.public_key());
            self.next_index += 1;
        }
        Ok(())
    }

    fn transaction_params(&self, value: U256) -> Result<TransactionParams> {
        fail_on!(self, "transaction_params");
        Ok(TransactionParams::new(owner(), value))
    }
}

#[derive(Default)]
pub struct MockSubmitter {
    /// Every (params, call) pair handed to `submit_or_serialize`
    pub submitted: Mutex<Vec<(TransactionParams, DepositCall)>>,
    pub fail: Option<&'static str>,
}

impl MockSubmitter {
    pub fn submissions(&self) -> Vec<(TransactionParams, DepositCall)> {
        self.submitted.lock().unwrap().clone()
    }
}

impl TransactionSubmitter for MockSubmitter {
    async fn estimate_gas(&self, _params: &TransactionParams, _call: &DepositCall) -> Result<GasInfo> {
        fail_on!(self, "estimate_gas");
        Ok(GasInfo::from_estimate(210_000))
    }

    async fn submit_or_serialize(
        &self,
        params: &TransactionParams,
        call: &DepositCall,
    ) -> Result<SubmittedTransaction> {
        fail_on!(self, "submit_or_serialize");
        let mut raw = Vec::new();
        raw.extend_from_slice(params.from.as_slice());
        raw.extend_from_slice(&params.nonce.unwrap_or_default().to_be_bytes());
        raw.extend_from_slice(call.pubkey.as_slice());
        raw.extend_from_slice(call.deposit_data_root.as_slice());
        self.submitted
            .lock()
            .unwrap()
            .push((params.clone(), call.clone()));
        Ok(SubmittedTransaction {
            hash: TxHash::from(keccak256(&raw)),
            raw: Bytes::from(raw),
        })
    }
}

pub type MockPipeline = DepositPipeline<MockLedger, MockProtocol, MockConsensus, MockSubmitter>;

pub fn pipeline() -> MockPipeline {
    DepositPipeline::new(
        MockLedger::default(),
        MockProtocol::default(),
        MockConsensus::default(),
        MockSubmitter::default(),
    )
}
