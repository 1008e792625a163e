use alloy::primitives::Address;
use colored::*;
use eyre::{Result, WrapErr};
use log::*;

use super::{
    address::AddressTemplate,
    traits::ProtocolState,
    types::{DepositType, DerivedTarget, ResolvedSalt},
};

/// Derives the minipool address and asks the protocol for the withdrawal
/// credentials bound to it. No retries, a failed lookup aborts.
pub async fn resolve_target<P: ProtocolState>(
    protocol: &P,
    template: &AddressTemplate,
    owner: Address,
    class: DepositType,
    salt: ResolvedSalt,
) -> Result<DerivedTarget> {
    let address = template.derive(owner, class, salt.value());
    let withdrawal_credentials = protocol
        .withdrawal_credentials_of(address)
        .await
        .wrap_err_with(|| format!("withdrawal credentials lookup for minipool {} failed", address))?;
    debug!(
        "minipool {} withdrawal credentials {}",
        address.to_string().blue(),
        withdrawal_credentials.to_string().magenta()
    );
    Ok(DerivedTarget {
        address,
        withdrawal_credentials,
    })
}
