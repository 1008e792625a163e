#[macro_use]
extern crate log;

use clap::{CommandFactory, Parser};
use colored::*;
use eyre::{Result, WrapErr, bail, eyre};
use std::path::{Path, PathBuf};

use alloy::primitives::{Address, hex};

use node_deposit::{
    beacon::BeaconClient,
    config::{self, *},
    deposit::{
        DepositPipeline, PreflightResult, SubmissionOutcome,
        types::{DepositRequest, RequestedSalt},
    },
    global, global_set, helpers,
    logger::Logger,
    print_field,
    rocketpool::{RocketPool, Submitter},
    rpc::Client,
    wallet::NodeWallet,
};

type Pipeline = DepositPipeline<Client, RocketPool, BeaconClient, Submitter>;

const ALIGN: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args with clap
    let args = Cli::parse();

    // Setup our global logger, the config file may still change its level
    let logger = Logger::new(3u8);
    logger.set_global()?;

    // Load config file & shellexpand datadir so we can use "~/...", etc
    let mut config = config::merge_args_from_file::<CliArgs>(args.config, args.config_path)?;
    let datadir = config
        .datadir
        .clone()
        .ok_or_else(|| eyre!("missing --datadir"))?;
    config.datadir = Some(expand_path(&datadir)?);
    logger.set_log_level(config.log_level.unwrap_or(3u8))?;

    // Store global ref to our logger and config
    global_set!(logger) = logger;
    global_set!(config) = config;

    cmd_dispatch(&Cli::command(), &args.command).await
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path = path
        .to_str()
        .ok_or_else(|| eyre!("invalid path {:?}", path))?;
    Ok(shellexpand::full(path)?.to_string().into())
}

fn required<T: Clone>(value: &Option<T>, flag: &str) -> Result<T> {
    value
        .clone()
        .ok_or_else(|| eyre!("must specify {} (command line or config file)", flag))
}

async fn load_pipeline(tx_args: TxCommonArgs) -> Result<(Pipeline, NodeWallet)> {
    let config = global!(config).clone();
    let client = Client::connect(&required(&config.rpc_url, "--rpc-url")?).await?;
    let storage = match &config.storage_address {
        Some(addr) => addr
            .parse::<Address>()
            .wrap_err_with(|| format!("invalid --storage-address '{}'", addr))?,
        None => global!(chain).rocket_storage,
    };
    let pool = RocketPool::load(client.clone(), storage).await?;
    let beacon = BeaconClient::new(&required(&config.beacon_url, "--beacon-url")?)?;

    let wallet = NodeWallet::load(
        &required(&config.datadir, "--datadir")?,
        &expand_path(&required(&config.keystore, "--keystore")?)?,
        &required(&config.password_file, "--password-file")?,
        &required(&config.mnemonic_file, "--mnemonic-file")?,
    )?;
    let submitter = Submitter::new(pool.clone(), wallet.signer(), tx_args);

    Ok((DepositPipeline::new(client, pool, beacon, submitter), wallet))
}

fn deposit_request(args: &DepositArgs, submit: bool, nonce: Option<u64>) -> Result<DepositRequest> {
    let amount_gwei = helpers::eth_to_gwei(args.eth)?;
    let salt = RequestedSalt::from(helpers::parse_salt(&args.salt)?);
    let request = DepositRequest::new(amount_gwei, args.min_fee, salt, submit).with_nonce(nonce);
    // Fail on a bad fee before touching the network
    request.min_node_fee_wei()?;
    Ok(request)
}

fn print_preflight(result: &PreflightResult) {
    let flag = |v: bool| match v {
        true => "yes".red(),
        false => "no".green(),
    };
    print_field!(ALIGN, "insufficient_balance", flag(result.insufficient_balance), normal);
    print_field!(ALIGN, "deposits_disabled", flag(result.deposits_disabled), normal);
    print_field!(
        ALIGN,
        "insufficient_stake_headroom",
        flag(result.insufficient_stake_headroom),
        normal
    );
    print_field!(ALIGN, "invalid_amount", flag(result.invalid_amount), normal);
    print_field!(ALIGN, "unbonded_limit_reached", flag(result.unbonded_limit_reached), normal);
    print_field!(ALIGN, "not_in_consensus", flag(result.not_in_consensus), normal);
    print_field!(ALIGN, "salt", result.salt.value(), magenta);
    print_field!(ALIGN, "minipool", result.target.address, blue);
    print_field!(
        ALIGN,
        "withdrawal_credentials",
        result.target.withdrawal_credentials,
        blue
    );
    print_field!(ALIGN, "gas_estimate", result.gas.estimated, magenta);
    print_field!(ALIGN, "gas_safe_limit", result.gas.safe_limit, magenta);
    for reason in result.reasons() {
        println!("{} {}", "No go:".red().bold(), reason.red());
    }
    match result.can_proceed() {
        true => println!("{}", "The node can deposit.".green().bold()),
        false => println!("{}", "The node cannot deposit.".red().bold()),
    }
}

fn print_outcome(outcome: &SubmissionOutcome) {
    print_field!(ALIGN, "tx_hash", outcome.tx_hash, red);
    print_field!(ALIGN, "minipool", outcome.target.address, blue);
    print_field!(ALIGN, "validator_pubkey", outcome.pubkey, blue);
    print_field!(ALIGN, "salt", outcome.salt.value(), magenta);
    print_field!(
        ALIGN,
        "scrub_period",
        format!("{}h", outcome.scrub_period.as_secs() / 3600),
        yellow
    );
    match &outcome.raw_transaction {
        Some(raw) => {
            println!("{}", "Signed transaction (not sent):".white().bold());
            println!("{}", hex::encode_prefixed(raw));
        }
        None => println!(
            "{}",
            "Deposit sent, the minipool stays in prelaunch until the scrub check passes."
                .green()
                .bold()
        ),
    }
}

async fn cmd_dispatch(app: &clap::Command, cmd: &CliCmd) -> Result<()> {
    match cmd {
        CliCmd::Version {} => {
            let mut ver = app.render_version();
            ver.pop(); // remove "\n"
            println!("version: {}", ver);
        }
        CliCmd::CanDeposit { deposit } => {
            let request = deposit_request(deposit, false, None)?;
            let (pipeline, wallet) = load_pipeline(TxCommonArgs::default()).await?;
            let result = pipeline.can_deposit(&wallet, &request).await?;
            trace!("{}", serde_json::to_string_pretty(&result.report()?)?);
            print_preflight(&result);
        }
        CliCmd::Deposit {
            deposit,
            submit,
            tx_args,
        } => {
            let request = deposit_request(deposit, *submit, tx_args.nonce)?;
            let (pipeline, mut wallet) = load_pipeline(tx_args.clone()).await?;

            let preflight = pipeline.can_deposit(&wallet, &request).await?;
            if !preflight.can_proceed() {
                print_preflight(&preflight);
                bail!("deposit refused: {}", preflight.reasons().join(", "));
            }
            info!(
                "Depositing {} eth through {}",
                helpers::format_eth(&request.amount_wei()).yellow(),
                pipeline.ledger.rpc_url.white()
            );

            match pipeline.deposit(&mut wallet, &request).await {
                Ok(outcome) => print_outcome(&outcome),
                Err(e) if e.funds_moved() => {
                    error!("{}", e);
                    println!(
                        "{}",
                        "FUNDS HAVE BEEN DEPOSITED. Do not retry, back up your datadir first."
                            .red()
                            .bold()
                    );
                    return Err(e.into());
                }
                Err(e) => {
                    if e.is_safety_critical() {
                        error!("{}", e);
                    }
                    println!("{}", "No funds were deposited.".yellow());
                    return Err(e.into());
                }
            }
        }
    }
    Ok(())
}
