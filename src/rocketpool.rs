//! Protocol contract bindings. Every contract address is resolved once
//! through the storage contract when the pool is loaded.
use std::time::Duration;

use alloy::{
    consensus::SignableTransaction,
    network::{TransactionBuilder, TxSigner},
    primitives::{Address, B256, Bytes, U256, keccak256},
    signers::local::PrivateKeySigner,
    sol,
};
use colored::*;
use eyre::{Result, WrapErr, bail, eyre};
use log::*;

use crate::{
    config::TxCommonArgs,
    deposit::{
        AddressTemplate, DepositType, GasInfo, NetworkIdentity, SubmittedTransaction,
        TransactionParams,
        traits::{ProtocolState, TransactionSubmitter},
        types::DepositCall,
    },
    rpc::{self, Client},
};

sol! {
    #[sol(rpc)]
    interface IRocketStorage {
        function getAddress(bytes32 _key) external view returns (address);
    }

    #[sol(rpc)]
    interface IRocketNodeManager {
        function getNodeExists(address _nodeAddress) external view returns (bool);
    }

    #[sol(rpc)]
    interface IRocketDAOProtocolSettingsNode {
        function getDepositEnabled() external view returns (bool);
    }

    #[sol(rpc)]
    interface IRocketDAONodeTrusted {
        function getMemberIsValid(address _nodeAddress) external view returns (bool);
        function getMemberUnbondedValidatorCount(address _nodeAddress) external view returns (uint256);
    }

    #[sol(rpc)]
    interface IRocketDAONodeTrustedSettingsMinipool {
        function getMinipoolUnbondedMax() external view returns (uint256);
        function getScrubPeriod() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IRocketMinipoolManager {
        function getNodeMinipoolCount(address _nodeAddress) external view returns (uint256);
        function getMinipoolWithdrawalCredentials(address _minipoolAddress) external pure returns (bytes memory);
        function getMinipoolBytecode() external view returns (bytes memory);
    }

    #[sol(rpc)]
    interface IRocketNetworkPrices {
        function inConsensus() external view returns (bool);
    }

    #[sol(rpc)]
    interface IRocketNodeStaking {
        function getNodeMinipoolLimit(address _nodeAddress) external view returns (uint256);
    }

    #[sol(rpc)]
    interface IRocketNodeDeposit {
        function getDepositType(uint256 _amount) external view returns (uint8);
        function deposit(
            uint256 _minimumNodeFee,
            bytes calldata _validatorPubkey,
            bytes calldata _validatorSignature,
            bytes32 _depositDataRoot,
            uint256 _salt,
            address _expectedMinipoolAddress
        ) external payable;
    }
}

/// Storage key under which a contract address is registered
pub fn contract_key(name: &str) -> B256 {
    keccak256(format!("contract.address{}", name))
}

fn to_u64(value: U256, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| eyre!("{} out of range: {}", what, value))
}

#[derive(Debug, Clone, Copy)]
struct Contracts {
    node_manager: Address,
    settings_node: Address,
    dao_trusted: Address,
    trusted_settings_minipool: Address,
    minipool_manager: Address,
    node_staking: Address,
    node_deposit: Address,
    network_prices: Address,
    casper_deposit: Address,
}

#[derive(Debug, Clone)]
pub struct RocketPool {
    pub client: Client,
    pub storage: Address,
    contracts: Contracts,
}

impl RocketPool {
    pub async fn load(client: Client, storage: Address) -> Result<RocketPool> {
        if storage == Address::ZERO {
            bail!("unknown storage contract for chain {}, use --storage-address", client.chain_id)
        }
        let rocket_storage = IRocketStorage::new(storage, client.provider());
        let lookup = async |name: &'static str| -> Result<Address> {
            let addr = rocket_storage
                .getAddress(contract_key(name))
                .call()
                .await
                .wrap_err_with(|| format!("{} lookup failed", name))?;
            if addr == Address::ZERO {
                bail!("{} is not registered in storage {}", name, storage)
            }
            trace!("{}: {}", name, addr);
            Ok(addr)
        };

        let (
            node_manager,
            settings_node,
            dao_trusted,
            trusted_settings_minipool,
            minipool_manager,
            node_staking,
            node_deposit,
            network_prices,
            casper_deposit,
        ) = tokio::try_join!(
            lookup("rocketNodeManager"),
            lookup("rocketDAOProtocolSettingsNode"),
            lookup("rocketDAONodeTrusted"),
            lookup("rocketDAONodeTrustedSettingsMinipool"),
            lookup("rocketMinipoolManager"),
            lookup("rocketNodeStaking"),
            lookup("rocketNodeDeposit"),
            lookup("rocketNetworkPrices"),
            lookup("casperDeposit"),
        )?;

        debug!(
            "{} {}",
            "Loaded protocol contracts from storage".white(),
            storage.to_string().green()
        );

        Ok(RocketPool {
            client,
            storage,
            contracts: Contracts {
                node_manager,
                settings_node,
                dao_trusted,
                trusted_settings_minipool,
                minipool_manager,
                node_staking,
                node_deposit,
                network_prices,
                casper_deposit,
            },
        })
    }

    pub fn node_deposit_address(&self) -> Address {
        self.contracts.node_deposit
    }

    /// ABI encoded `deposit(...)` call data
    pub fn deposit_calldata(&self, call: &DepositCall) -> Bytes {
        let node_deposit = IRocketNodeDeposit::new(self.contracts.node_deposit, self.client.provider());
        node_deposit
            .deposit(
                call.min_node_fee,
                Bytes::copy_from_slice(call.pubkey.as_slice()),
                Bytes::copy_from_slice(call.signature.as_slice()),
                call.deposit_data_root,
                call.salt,
                call.expected_minipool,
            )
            .calldata()
            .clone()
    }
}

impl ProtocolState for RocketPool {
    async fn node_exists(&self, node: Address) -> Result<bool> {
        let contract = IRocketNodeManager::new(self.contracts.node_manager, self.client.provider());
        Ok(contract.getNodeExists(node).call().await?)
    }

    async fn deposits_enabled(&self) -> Result<bool> {
        let contract =
            IRocketDAOProtocolSettingsNode::new(self.contracts.settings_node, self.client.provider());
        Ok(contract.getDepositEnabled().call().await?)
    }

    async fn stake_limit_of(&self, node: Address) -> Result<u64> {
        let contract = IRocketNodeStaking::new(self.contracts.node_staking, self.client.provider());
        to_u64(
            contract.getNodeMinipoolLimit(node).call().await?,
            "minipool limit",
        )
    }

    async fn stake_count_of(&self, node: Address) -> Result<u64> {
        let contract =
            IRocketMinipoolManager::new(self.contracts.minipool_manager, self.client.provider());
        to_u64(
            contract.getNodeMinipoolCount(node).call().await?,
            "minipool count",
        )
    }

    async fn unbonded_max_count(&self) -> Result<u64> {
        let contract = IRocketDAONodeTrustedSettingsMinipool::new(
            self.contracts.trusted_settings_minipool,
            self.client.provider(),
        );
        to_u64(
            contract.getMinipoolUnbondedMax().call().await?,
            "unbonded minipool max",
        )
    }

    async fn unbonded_count_of(&self, node: Address) -> Result<u64> {
        let contract = IRocketDAONodeTrusted::new(self.contracts.dao_trusted, self.client.provider());
        to_u64(
            contract.getMemberUnbondedValidatorCount(node).call().await?,
            "unbonded validator count",
        )
    }

    async fn is_trusted_member(&self, node: Address) -> Result<bool> {
        let contract = IRocketDAONodeTrusted::new(self.contracts.dao_trusted, self.client.provider());
        Ok(contract.getMemberIsValid(node).call().await?)
    }

    async fn prices_in_consensus(&self) -> Result<bool> {
        let contract =
            IRocketNetworkPrices::new(self.contracts.network_prices, self.client.provider());
        Ok(contract.inConsensus().call().await?)
    }

    async fn deposit_type(&self, amount_wei: U256) -> Result<DepositType> {
        let contract = IRocketNodeDeposit::new(self.contracts.node_deposit, self.client.provider());
        DepositType::try_from(contract.getDepositType(amount_wei).call().await?)
    }

    async fn address_template(&self) -> Result<AddressTemplate> {
        let contract =
            IRocketMinipoolManager::new(self.contracts.minipool_manager, self.client.provider());
        let bytecode = contract.getMinipoolBytecode().call().await?;
        if bytecode.is_empty() {
            bail!("minipool bytecode is empty")
        }
        Ok(AddressTemplate::new(
            self.contracts.minipool_manager,
            self.storage,
            bytecode,
        ))
    }

    async fn withdrawal_credentials_of(&self, minipool: Address) -> Result<B256> {
        let contract =
            IRocketMinipoolManager::new(self.contracts.minipool_manager, self.client.provider());
        let creds = contract
            .getMinipoolWithdrawalCredentials(minipool)
            .call()
            .await?;
        match creds.len() {
            32 => Ok(B256::from_slice(&creds)),
            n => bail!("withdrawal credentials must be 32 bytes, got {}", n),
        }
    }

    async fn deposit_network(&self) -> Result<NetworkIdentity> {
        Ok(NetworkIdentity {
            chain_id: self.client.chain_id,
            deposit_contract: self.contracts.casper_deposit,
        })
    }

    async fn scrub_period(&self) -> Result<Duration> {
        let contract = IRocketDAONodeTrustedSettingsMinipool::new(
            self.contracts.trusted_settings_minipool,
            self.client.provider(),
        );
        let secs = to_u64(contract.getScrubPeriod().call().await?, "scrub period")?;
        Ok(Duration::from_secs(secs))
    }
}

/// Signs deposits with the node account and broadcasts them through the
/// execution client
pub struct Submitter {
    pool: RocketPool,
    signer: PrivateKeySigner,
    tx_args: TxCommonArgs,
}

impl Submitter {
    pub fn new(pool: RocketPool, signer: PrivateKeySigner, tx_args: TxCommonArgs) -> Self {
        Submitter {
            pool,
            signer,
            tx_args,
        }
    }
}

impl TransactionSubmitter for Submitter {
    async fn estimate_gas(&self, params: &TransactionParams, call: &DepositCall) -> Result<GasInfo> {
        let tx = rpc::gen_tx_request(
            &self.pool.client,
            self.pool.node_deposit_address(),
            params,
            &self.tx_args,
        )
        .await?
        .with_input(self.pool.deposit_calldata(call));
        let estimated = self
            .pool
            .client
            .estimate_gas(&tx)
            .await
            .wrap_err_with(|| "estimate_gas failed")?;
        Ok(GasInfo::from_estimate(estimated))
    }

    async fn submit_or_serialize(
        &self,
        params: &TransactionParams,
        call: &DepositCall,
    ) -> Result<SubmittedTransaction> {
        if params.from != self.signer.address() {
            bail!(
                "transaction sender {} is not the node account {}",
                params.from,
                self.signer.address()
            )
        }

        let tx = rpc::gen_tx_request(
            &self.pool.client,
            self.pool.node_deposit_address(),
            params,
            &self.tx_args,
        )
        .await?
        .with_input(self.pool.deposit_calldata(call));

        let tx = match tx.gas {
            Some(_) => tx,
            None => {
                let gas = self.estimate_gas(params, call).await?;
                debug!("gas_limit: {} (estimated {})", gas.safe_limit, gas.estimated);
                tx.with_gas_limit(gas.safe_limit)
            }
        };
        trace!("{:#?}", tx);

        let mut tx_signable = tx.build_unsigned()?;
        let signature = self.signer.sign_transaction(&mut tx_signable).await?;
        let (tx_envelope, raw) = rpc::encode_signed(tx_signable.into_signed(signature))?;
        let hash = *tx_envelope.hash();

        if params.no_send {
            debug!("Signed transaction {} (not sent)", hash.to_string().red());
            return Ok(SubmittedTransaction {
                hash,
                raw: raw.into(),
            });
        }

        let pending = self.pool.client.send_tx_envelope(tx_envelope).await?;
        info!(
            "Transaction {} succesfully sent.",
            pending.tx_hash().to_string().red()
        );
        Ok(SubmittedTransaction {
            hash: *pending.tx_hash(),
            raw: raw.into(),
        })
    }
}
