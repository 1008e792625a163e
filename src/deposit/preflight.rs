use alloy::primitives::Address;
use colored::*;
use log::*;

use super::{
    DepositPipeline,
    credentials::resolve_target,
    data::build_deposit_data,
    deposit_call,
    error::Result,
    traits::{AccountLedger, ConsensusStatus, KeyVault, ProtocolState, TransactionSubmitter},
    types::{
        DEPOSIT_AMOUNT_GWEI, DepositRequest, DerivedTarget, GasInfo, PreflightResult, ResolvedSalt,
    },
    verify::verify_deposit,
};

impl<L, P, C, S> DepositPipeline<L, P, C, S>
where
    L: AccountLedger,
    P: ProtocolState,
    C: ConsensusStatus,
    S: TransactionSubmitter,
{
    /// Read-only evaluation of whether `request` could be deposited right now.
    ///
    /// Every check runs concurrently, the first failing query aborts the
    /// whole evaluation. The deposit is fully built and verified to get a
    /// gas estimate, so a verification failure surfaces here as an error.
    pub async fn can_deposit<V: KeyVault>(
        &self,
        vault: &V,
        request: &DepositRequest,
    ) -> Result<PreflightResult> {
        let node = vault.account_address()?;
        self.require_registered(node).await?;
        let salt = self.resolve_salt(node, request.salt).await?;
        let amount_wei = request.amount_wei();

        let (
            balance,
            enabled,
            trusted,
            stake_count,
            stake_limit,
            prices_in_consensus,
            beacon_healthy,
            (target, gas),
        ) = tokio::try_join!(
            self.ledger.balance_of(node),
            self.protocol.deposits_enabled(),
            self.protocol.is_trusted_member(node),
            self.protocol.stake_count_of(node),
            self.protocol.stake_limit_of(node),
            self.protocol.prices_in_consensus(),
            self.consensus.in_consensus(),
            self.estimate_deposit(vault, node, request, salt),
        )?;
        debug!(
            "balance: {} trusted: {} minipools: {}/{} prices: {} beacon: {}",
            balance.to_string().blue(),
            trusted.to_string().yellow(),
            stake_count.to_string().magenta(),
            stake_limit.to_string().magenta(),
            prices_in_consensus.to_string().green(),
            beacon_healthy.to_string().green(),
        );

        let mut result = PreflightResult {
            insufficient_balance: amount_wei > balance,
            deposits_disabled: !enabled,
            insufficient_stake_headroom: stake_count >= stake_limit,
            invalid_amount: !trusted && request.is_zero_amount(),
            unbonded_limit_reached: false,
            not_in_consensus: !(prices_in_consensus && beacon_healthy),
            salt,
            target,
            gas,
        };

        // Unbonded minipools only exist for trusted nodes depositing nothing
        if trusted && request.is_zero_amount() {
            let (unbonded, unbonded_max) = tokio::try_join!(
                self.protocol.unbonded_count_of(node),
                self.protocol.unbonded_max_count(),
            )?;
            debug!(
                "unbonded minipools: {}/{}",
                unbonded.to_string().magenta(),
                unbonded_max.to_string().magenta()
            );
            result.unbonded_limit_reached = unbonded >= unbonded_max;
        }

        match result.can_proceed() {
            true => info!("Deposit pre-flight {}", "passed".green().bold()),
            false => warn!(
                "Deposit pre-flight {}: {}",
                "failed".red().bold(),
                result.reasons().join(", ")
            ),
        }
        Ok(result)
    }

    /// Builds and verifies the deposit the node would submit next, using
    /// the vault's upcoming key without creating it, and estimates its gas
    async fn estimate_deposit<V: KeyVault>(
        &self,
        vault: &V,
        node: Address,
        request: &DepositRequest,
        salt: ResolvedSalt,
    ) -> eyre::Result<(DerivedTarget, GasInfo)> {
        let (class, template, network) = tokio::try_join!(
            self.protocol.deposit_type(request.amount_wei()),
            self.protocol.address_template(),
            self.consensus.network_config(),
        )?;
        let key = vault.next_validator_key()?;

        let target = resolve_target(&self.protocol, &template, node, class, salt).await?;
        let data = build_deposit_data(&key, target.withdrawal_credentials, &network);
        verify_deposit(
            &network,
            DEPOSIT_AMOUNT_GWEI,
            &data.pubkey,
            &target.withdrawal_credentials,
            &data.signature,
        )?;

        let call = deposit_call(request, &data, salt, target.address)?;
        let params = vault.transaction_params(request.amount_wei())?;
        let gas = self.submitter.estimate_gas(&params, &call).await?;
        trace!("gas: {:?}", gas);
        Ok((target, gas))
    }
}
