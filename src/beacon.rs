//! Beacon node REST client, only the handful of endpoints a deposit needs
use alloy::primitives::{Address, FixedBytes, hex};
use colored::*;
use eyre::{Result, WrapErr, bail};
use log::*;
use serde::de::DeserializeOwned;
use serde_derive::Deserialize;
use url::Url;

use crate::deposit::{
    BlsPublicKey, DOMAIN_DEPOSIT, NetworkConfig, NetworkIdentity, ValidatorStatus,
    traits::ConsensusStatus,
};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct SpecResponse {
    #[serde(rename = "GENESIS_FORK_VERSION")]
    genesis_fork_version: FixedBytes<4>,
    #[serde(rename = "DOMAIN_DEPOSIT")]
    domain_deposit: FixedBytes<4>,
}

#[derive(Debug, Deserialize)]
struct DepositContractResponse {
    #[serde(with = "serde_utils::quoted_u64")]
    chain_id: u64,
    address: Address,
}

#[derive(Debug, Deserialize)]
struct ValidatorResponse {
    #[serde(with = "serde_utils::quoted_u64")]
    index: u64,
    status: String,
}

#[derive(Debug, Deserialize)]
struct SyncingResponse {
    #[serde(with = "serde_utils::quoted_u64")]
    head_slot: u64,
    is_syncing: bool,
    #[serde(default)]
    is_optimistic: bool,
    #[serde(default)]
    el_offline: bool,
}

#[derive(Debug, Clone)]
pub struct BeaconClient {
    base: Url,
    http: reqwest::Client,
}

impl BeaconClient {
    pub fn new(url: &str) -> Result<BeaconClient> {
        if url.trim().is_empty() {
            bail!("must specify a valid --beacon-url")
        };
        let base = Url::parse(url).wrap_err_with(|| format!("invalid beacon url '{}'", url))?;
        Ok(BeaconClient {
            base,
            http: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .wrap_err_with(|| format!("invalid beacon endpoint '{}'", path))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        trace!("GET {}", url);
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .wrap_err_with(|| format!("GET {} failed", url))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("GET {} returned {}: {}", url, status, body);
        }
        let envelope = resp
            .json::<Envelope<T>>()
            .await
            .wrap_err_with(|| format!("GET {} returned malformed json", url))?;
        Ok(envelope.data)
    }
}

impl ConsensusStatus for BeaconClient {
    async fn network_config(&self) -> Result<NetworkConfig> {
        let spec: SpecResponse = self.get("eth/v1/config/spec").await?;
        if spec.domain_deposit.0 != DOMAIN_DEPOSIT {
            bail!(
                "beacon node reports deposit domain {} (expected {})",
                spec.domain_deposit,
                hex::encode_prefixed(DOMAIN_DEPOSIT)
            );
        }
        debug!(
            "{} {}",
            "genesis_fork_version:".white().bold(),
            spec.genesis_fork_version.to_string().blue()
        );
        Ok(NetworkConfig::new(spec.genesis_fork_version.0))
    }

    async fn in_consensus(&self) -> Result<bool> {
        let sync: SyncingResponse = self.get("eth/v1/node/syncing").await?;
        debug!(
            "beacon head_slot:{} syncing:{} optimistic:{} el_offline:{}",
            sync.head_slot, sync.is_syncing, sync.is_optimistic, sync.el_offline
        );
        Ok(!(sync.is_syncing || sync.is_optimistic || sync.el_offline))
    }

    async fn validator_status(&self, pubkey: &BlsPublicKey) -> Result<ValidatorStatus> {
        let path = format!("eth/v1/beacon/states/head/validators?id={}", pubkey);
        let validators: Vec<ValidatorResponse> = self.get(&path).await?;
        match validators.first() {
            Some(v) => {
                debug!("validator {} found: index={} status={}", pubkey, v.index, v.status);
                Ok(ValidatorStatus {
                    exists: true,
                    index: v.index,
                })
            }
            None => Ok(ValidatorStatus {
                exists: false,
                index: 0,
            }),
        }
    }

    async fn network_identity(&self) -> Result<NetworkIdentity> {
        let contract: DepositContractResponse = self
            .get("eth/v1/config/deposit_contract")
            .await
            .wrap_err("deposit contract query failed")?;
        Ok(NetworkIdentity {
            chain_id: contract.chain_id,
            deposit_contract: contract.address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spec_ignoring_unknown_fields() {
        let json = r#"{"data":{"CONFIG_NAME":"holesky","GENESIS_FORK_VERSION":"0x01017000",
            "DOMAIN_DEPOSIT":"0x03000000","SECONDS_PER_SLOT":"12"}}"#;
        let spec: Envelope<SpecResponse> = serde_json::from_str(json).unwrap();
        assert_eq!(spec.data.genesis_fork_version.0, [0x01, 0x01, 0x70, 0x00]);
        assert_eq!(spec.data.domain_deposit.0, DOMAIN_DEPOSIT);
    }

    #[test]
    fn parses_quoted_numbers() {
        let json = r#"{"data":{"chain_id":"17000","address":"0x4242424242424242424242424242424242424242"}}"#;
        let contract: Envelope<DepositContractResponse> = serde_json::from_str(json).unwrap();
        assert_eq!(contract.data.chain_id, 17000);

        let json = r#"{"data":[{"index":"1234","balance":"32000000000","status":"active_ongoing",
            "validator":{}}]}"#;
        let validators: Envelope<Vec<ValidatorResponse>> = serde_json::from_str(json).unwrap();
        assert_eq!(validators.data[0].index, 1234);

        let json = r#"{"data":{"head_slot":"42","sync_distance":"0","is_syncing":false}}"#;
        let sync: Envelope<SyncingResponse> = serde_json::from_str(json).unwrap();
        assert!(!sync.data.is_syncing && !sync.data.is_optimistic);
    }

    #[tokio::test]
    async fn deposit_contract_failure_keeps_cause() {
        let client = BeaconClient::new("http://127.0.0.1:1/").unwrap();
        let err = client.network_identity().await.unwrap_err();
        assert_eq!(err.to_string(), "deposit contract query failed");
        assert!(
            err.chain()
                .any(|cause| cause.to_string().contains("eth/v1/config/deposit_contract"))
        );
    }

    #[test]
    fn endpoints_join_base() {
        let client = BeaconClient::new("http://localhost:5052/").unwrap();
        assert_eq!(
            client.endpoint("eth/v1/node/syncing").unwrap().as_str(),
            "http://localhost:5052/eth/v1/node/syncing"
        );
        assert!(BeaconClient::new(" ").is_err());
    }
}
