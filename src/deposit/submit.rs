use colored::*;
use log::*;

use super::{
    DepositPipeline,
    credentials::resolve_target,
    data::build_deposit_data,
    deposit_call,
    error::{DepositError, Result},
    traits::{AccountLedger, ConsensusStatus, KeyVault, ProtocolState, TransactionSubmitter},
    types::{DEPOSIT_AMOUNT_GWEI, DepositRequest, SubmissionOutcome},
    verify::verify_deposit,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Broadcast,
    DryRun,
}

/// Progress of a deposit, each stage only reachable from the one before
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositStage {
    Initialized,
    SaltResolved,
    NetworkVerified,
    KeyCreated,
    TargetDerived,
    DataBuilt,
    DuplicateChecked,
    Verified,
    Submitted(SubmitMode),
    KeyPersisted,
}

impl std::fmt::Display for DepositStage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DepositStage::Submitted(mode) => write!(f, "Submitted({:?})", mode),
            stage => write!(f, "{:?}", stage),
        }
    }
}

impl<L, P, C, S> DepositPipeline<L, P, C, S>
where
    L: AccountLedger,
    P: ProtocolState,
    C: ConsensusStatus,
    S: TransactionSubmitter,
{
    /// Creates a validator key and deposits it, or only serializes the signed
    /// transaction when `request.submit` is false.
    ///
    /// Strictly sequential and fail-fast. The new key only reaches durable
    /// storage after the network accepted the transaction; on any earlier
    /// failure it is dropped with the vault's in-memory state.
    pub async fn deposit<V: KeyVault>(
        &self,
        vault: &mut V,
        request: &DepositRequest,
    ) -> Result<SubmissionOutcome> {
        let mut stage = DepositStage::Initialized;
        let mut advance = |next: DepositStage| {
            debug!("deposit stage {} -> {}", stage, next.to_string().cyan());
            stage = next;
        };

        let node = vault.account_address()?;
        self.require_registered(node).await?;

        let salt = self.resolve_salt(node, request.salt).await?;
        advance(DepositStage::SaltResolved);

        let local = self.protocol.deposit_network().await?;
        let beacon = self.consensus.network_identity().await?;
        if local != beacon {
            return Err(DepositError::NetworkMismatch { local, beacon });
        }
        advance(DepositStage::NetworkVerified);

        let network = self.consensus.network_config().await?;
        let scrub_period = self.protocol.scrub_period().await?;
        let class = self.protocol.deposit_type(request.amount_wei()).await?;
        debug!("deposit type: {:?}", class);

        let key = vault.create_validator_key()?;
        advance(DepositStage::KeyCreated);

        let template = self.protocol.address_template().await?;
        let target = resolve_target(&self.protocol, &template, node, class, salt).await?;
        advance(DepositStage::TargetDerived);

        let data = build_deposit_data(&key, target.withdrawal_credentials, &network);
        advance(DepositStage::DataBuilt);

        let status = self
            .consensus
            .validator_status(&data.pubkey)
            .await
            .map_err(DepositError::ValidatorStatus)?;
        if status.exists {
            return Err(DepositError::DuplicateValidator {
                address: target.address,
                pubkey: data.pubkey.to_string(),
                index: status.index,
            });
        }
        advance(DepositStage::DuplicateChecked);

        verify_deposit(
            &network,
            DEPOSIT_AMOUNT_GWEI,
            &data.pubkey,
            &target.withdrawal_credentials,
            &data.signature,
        )?;
        advance(DepositStage::Verified);

        let mut params = vault.transaction_params(request.amount_wei())?;
        if let Some(nonce) = request.nonce {
            debug!("nonce override: {}", nonce.to_string().magenta());
            params.nonce = Some(nonce);
        }
        let mode = match request.submit {
            true => SubmitMode::Broadcast,
            false => SubmitMode::DryRun,
        };
        params.no_send = mode == SubmitMode::DryRun;

        let call = deposit_call(request, &data, salt, target.address)?;
        let tx = self.submitter.submit_or_serialize(&params, &call).await?;
        advance(DepositStage::Submitted(mode));

        if mode == SubmitMode::Broadcast {
            vault
                .persist()
                .map_err(|cause| DepositError::KeyPersistence {
                    tx_hash: tx.hash,
                    cause,
                })?;
            advance(DepositStage::KeyPersisted);
        }

        info!(
            "Minipool {} deposit {} ({})",
            target.address.to_string().blue(),
            tx.hash.to_string().red(),
            match mode {
                SubmitMode::Broadcast => "sent".green(),
                SubmitMode::DryRun => "not sent".yellow(),
            }
        );

        Ok(SubmissionOutcome {
            tx_hash: tx.hash,
            target,
            pubkey: data.pubkey,
            salt,
            raw_transaction: match mode {
                SubmitMode::Broadcast => None,
                SubmitMode::DryRun => Some(tx.raw),
            },
            scrub_period,
        })
    }
}
