use alloy::{
    consensus::{Signed, TxEnvelope, TypedTransaction},
    eips::{eip1559::Eip1559Estimation, eip2718::Decodable2718},
    network::{Ethereum, TransactionBuilder},
    primitives::{Address, U256, utils::parse_units},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
};
use colored::*;
use eyre::{Result, WrapErr, bail};
use log::*;

use crate::{
    config::TxCommonArgs,
    deposit::{TransactionParams, traits::AccountLedger},
    global, globals,
};

/// Execution layer connection, cheap to clone as the provider is shared
#[derive(Clone)]
pub struct Client {
    pub rpc_url: String,
    pub chain_id: u64,
    provider: DynProvider,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl Client {
    pub async fn connect(url: &str) -> Result<Client> {
        if url.trim().is_empty() {
            bail!("must specify a valid --rpc-url")
        };

        let provider = DynProvider::new(
            ProviderBuilder::new()
                .connect(url)
                .await
                .wrap_err_with(|| format!("Connect failed to '{}'", url))?,
        );

        let chain_id = provider.get_chain_id().await?;
        let height = provider.get_block_number().await?;

        // Init global chain data
        globals::set_chain(&chain_id);

        debug!(
            "Connected to {} {}:{} {}:{}",
            format!("{}", global!(chain).name).green().bold(),
            "chainId".white().bold(),
            format!("{:?}", chain_id).blue(),
            "height".white().bold(),
            format!("{:?}", height).blue(),
        );

        Ok(Client {
            rpc_url: url.to_string(),
            chain_id,
            provider,
        })
    }

    pub fn provider(&self) -> DynProvider {
        DynProvider::clone(&self.provider)
    }

    pub async fn estimate_fees(&self) -> Result<Eip1559Estimation> {
        Ok(self.provider.estimate_eip1559_fees().await?)
    }

    pub async fn balance(&self, addr: &Address) -> Result<U256> {
        Ok(self.provider.get_balance(*addr).await?)
    }

    pub async fn nonce(&self, addr: &Address) -> Result<u64> {
        Ok(self.provider.get_transaction_count(*addr).await?)
    }

    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        Ok(self.provider.estimate_gas(tx.clone()).await?)
    }

    pub async fn send_tx_envelope(
        &self,
        tx: TxEnvelope,
    ) -> Result<PendingTransactionBuilder<Ethereum>> {
        Ok(self.provider.send_tx_envelope(tx).await?)
    }
}

impl AccountLedger for Client {
    async fn balance_of(&self, address: Address) -> Result<U256> {
        self.balance(&address)
            .await
            .wrap_err_with(|| format!("balance query failed for {}", address))
    }

    async fn sequence_number_of(&self, address: Address) -> Result<u64> {
        self.nonce(&address)
            .await
            .wrap_err_with(|| format!("nonce query failed for {}", address))
    }
}

/// Fee pair from the command line, both or neither must be given
pub fn fee_override(tx_args: &TxCommonArgs) -> Result<Option<Eip1559Estimation>> {
    match (tx_args.max_fee, tx_args.max_priority) {
        (Some(max_fee), Some(max_priority)) => {
            let max_fee_per_gas: u128 = parse_units(&max_fee.to_string(), "gwei")?.try_into()?;
            let max_priority_fee_per_gas: u128 =
                parse_units(&max_priority.to_string(), "gwei")?.try_into()?;
            if max_fee_per_gas < max_priority_fee_per_gas {
                bail!(
                    "Max fee ({}) must be greater than priority fee ({})",
                    max_fee,
                    max_priority
                )
            }
            Ok(Some(Eip1559Estimation {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            }))
        }
        (None, None) => Ok(None),
        _ => bail!("--max-fee and --max-priority must be specified together"),
    }
}

/// Builds an EIP-1559 request, explicit nonce and fees take precedence over
/// the values queried from the node
pub async fn gen_tx_request(
    client: &Client,
    to: Address,
    params: &TransactionParams,
    tx_args: &TxCommonArgs,
) -> Result<TransactionRequest> {
    let nonce = match params.nonce.or(tx_args.nonce) {
        Some(nonce) => nonce,
        None => client.nonce(&params.from).await?,
    };
    let estimation = match fee_override(tx_args)? {
        Some(estimation) => estimation,
        None => client.estimate_fees().await?,
    };

    let tx = TransactionRequest::default()
        .with_from(params.from)
        .with_to(to)
        .with_value(params.value)
        .with_nonce(nonce)
        .with_chain_id(client.chain_id)
        .with_max_priority_fee_per_gas(estimation.max_priority_fee_per_gas)
        .with_max_fee_per_gas(estimation.max_fee_per_gas);

    let tx = match params.gas_limit.or(tx_args.gas_limit) {
        Some(gas_limit) => tx.with_gas_limit(gas_limit),
        None => tx,
    };

    Ok(tx)
}

/// Round trips a signed transaction through its EIP-2718 encoding, returning
/// the raw bytes alongside the envelope
pub fn encode_signed(tx_signed: Signed<TypedTransaction>) -> Result<(TxEnvelope, Vec<u8>)> {
    let mut buf: Vec<u8> = Vec::new();
    tx_signed.eip2718_encode(&mut buf);
    let tx = TxEnvelope::decode_2718(&mut buf.as_ref())?;
    Ok((tx, buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(max_fee: Option<f64>, max_priority: Option<f64>) -> TxCommonArgs {
        TxCommonArgs {
            max_fee,
            max_priority,
            ..Default::default()
        }
    }

    #[test]
    fn fee_override_pairs() {
        assert!(fee_override(&args(None, None)).unwrap().is_none());

        let fees = fee_override(&args(Some(20.0), Some(1.5))).unwrap().unwrap();
        assert_eq!(fees.max_fee_per_gas, 20_000_000_000);
        assert_eq!(fees.max_priority_fee_per_gas, 1_500_000_000);

        assert!(fee_override(&args(Some(20.0), None)).is_err());
        assert!(fee_override(&args(Some(1.0), Some(2.0))).is_err());
    }
}
