use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::{fs::File, io::BufReader};

use eyre::{Result, WrapErr, bail};
use serde_derive::Deserialize;

use clap_serde_derive::{
    ClapSerde,
    clap::{self, Parser, Subcommand},
};

#[allow(deprecated)]
fn datadir() -> PathBuf {
    std::env::home_dir()
        .unwrap_or_default()
        .join(".node-deposit")
}

fn config_file() -> PathBuf {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) => PathBuf::from(OsString::from(dir)),
        Err(_) => datadir(),
    };
    base.join("node-deposit").join("config.toml")
}

#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Config file
    #[arg(short, long = "config", default_value = config_file().into_os_string())]
    pub config_path: Option<PathBuf>,

    /// Global arguments
    #[command(flatten)]
    pub config: <CliArgs as ClapSerde>::Opt,

    // Subcommands
    #[command(subcommand)]
    pub command: CliCmd,
}

// Make sure all values are optional or parsing fails if a value
// is missing in the config fill
#[derive(Debug, Clone, ClapSerde, Deserialize)]
pub struct CliArgs {
    /// Logging level (0: critical .. 5: trace)
    #[arg(short, long = "log-level", required = false, default_value = "3")]
    pub log_level: Option<u8>,

    /// Data directory
    #[arg(long = "datadir", default_value = datadir().into_os_string())]
    pub datadir: Option<PathBuf>,

    /// Execution client JsonRPC URL
    #[arg(long = "rpc-url", required = false)]
    pub rpc_url: Option<String>,

    /// Beacon node REST API URL
    #[arg(long = "beacon-url", required = false)]
    pub beacon_url: Option<String>,

    /// Protocol storage contract, defaults to the known deployment
    #[arg(long = "storage-address", required = false)]
    pub storage_address: Option<String>,

    /// Node account keystore
    #[arg(long = "keystore", required = false)]
    pub keystore: Option<PathBuf>,

    /// File holding the keystore password
    #[arg(long = "password-file", required = false)]
    pub password_file: Option<PathBuf>,

    /// File holding the node mnemonic validator keys are derived from
    #[arg(long = "mnemonic-file", required = false)]
    pub mnemonic_file: Option<PathBuf>,
}

// Command line cmds
#[derive(Subcommand)]
pub enum CliCmd {
    /// Print version information
    #[clap(visible_alias = "ver")]
    Version {},
    /// Check whether the node can make a deposit
    #[clap(visible_aliases = &["can", "check"])]
    CanDeposit {
        #[command(flatten)]
        deposit: DepositArgs,
    },
    /// Create a validator key and deposit into a new minipool
    #[clap(visible_alias = "d")]
    Deposit {
        #[command(flatten)]
        deposit: DepositArgs,
        /// Broadcast the transaction, otherwise only print the signed raw tx
        #[arg(long, required = false, action = clap::ArgAction::SetTrue)]
        submit: bool,
        /// tx common args
        #[command(flatten)]
        tx_args: TxCommonArgs,
    },
}

#[derive(Parser, Debug, Clone)]
pub struct DepositArgs {
    /// Eth amount to stake (0 for trusted nodes)
    #[arg(short, long = "eth", visible_aliases = &["a", "amount"], required = true)]
    pub eth: f64,
    /// Minimum node commission fee accepted (0..1)
    #[arg(short, long = "min-fee", required = false, default_value_t = 0.0)]
    pub min_fee: f64,
    /// Minipool address salt, 0 uses the account nonce
    #[arg(short, long, required = false, default_value = "0")]
    pub salt: String,
}

#[derive(Parser, Debug, Clone, Default)]
#[clap(
    // Fees are "all-or-none", if one is present the other must be as well
    group(clap::ArgGroup::new("fee_args")
        .required(false)
        .multiple(true)
        .requires_all(&["max_fee", "max_priority"])
        .args(&["max_fee", "max_priority"])
    ),
)]
pub struct TxCommonArgs {
    /// Nonce
    #[arg(long, required = false)]
    pub nonce: Option<u64>,
    /// Max priority fee per gas in gwei
    #[arg(long, required = false)]
    pub max_priority: Option<f64>,
    /// Max fee per gas in gwei
    #[arg(long, required = false)]
    pub max_fee: Option<f64>,
    /// TX gas limit
    #[arg(long, required = false)]
    pub gas_limit: Option<u64>,
}

pub fn merge_args_from_file<T>(
    args: <T as ClapSerde>::Opt,
    maybe_path: Option<PathBuf>,
) -> Result<T>
where
    T: ClapSerde + serde::de::DeserializeOwned,
{
    match maybe_path {
        Some(path) => {
            let config_path = std::path::Path::new(&path);
            match config_path.exists() {
                true => {
                    let config = match config_path.extension().and_then(OsStr::to_str) {
                        Some("toml") => read_toml_config::<T, _>(config_path),
                        Some("json") => read_json_config::<T, _>(config_path),
                        Some("jsonc") => read_jsonc_config::<T, _>(config_path),
                        _ => {
                            bail!("Unsupported config file type: {:?}", path);
                        }
                    }?;
                    // Values present in the config file update the command line ones
                    Ok(T::from(args).merge(config))
                }
                false => Ok(T::from(args)),
            }
        }
        None => Ok(T::from(args)),
    }
}

fn read_toml_config<T, P: AsRef<std::path::Path>>(path: P) -> Result<<T as ClapSerde>::Opt>
where
    P: AsRef<std::path::Path> + std::fmt::Debug + Copy,
    T: ClapSerde + serde::de::DeserializeOwned,
{
    let content = std::fs::read_to_string(path).wrap_err_with(|| format!("{:?}", path))?;
    Ok(toml::from_str(&content)?)
}

fn read_json_config<T: ClapSerde, P: AsRef<std::path::Path>>(
    path: P,
) -> Result<<T as ClapSerde>::Opt>
where
    P: AsRef<std::path::Path> + std::fmt::Debug + Copy,
{
    let f = File::open(path).wrap_err_with(|| format!("{:?}", path))?;
    let json_cfg = serde_json::from_reader::<_, <T as ClapSerde>::Opt>(BufReader::new(f))?;
    Ok(json_cfg)
}

fn read_jsonc_config<T: ClapSerde, P: AsRef<std::path::Path>>(
    path: P,
) -> Result<<T as ClapSerde>::Opt>
where
    P: AsRef<std::path::Path> + std::fmt::Debug + Copy,
{
    let f = File::open(path).wrap_err_with(|| format!("{:?}", path))?;
    let jsonc_cfg = serde_jsonc::from_reader::<_, <T as ClapSerde>::Opt>(BufReader::new(f))?;
    Ok(jsonc_cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_args_parse() {
        let cli = Cli::try_parse_from([
            "node-deposit",
            "--rpc-url",
            "http://localhost:8545",
            "deposit",
            "--eth",
            "16",
            "--min-fee",
            "0.1",
            "--submit",
            "--nonce",
            "4",
        ])
        .unwrap();
        match cli.command {
            CliCmd::Deposit {
                deposit,
                submit,
                tx_args,
            } => {
                assert_eq!(deposit.eth, 16.0);
                assert_eq!(deposit.min_fee, 0.1);
                assert_eq!(deposit.salt, "0");
                assert!(submit);
                assert_eq!(tx_args.nonce, Some(4));
            }
            _ => panic!("expected deposit"),
        }
    }

    #[test]
    fn fee_args_are_all_or_none() {
        let res = Cli::try_parse_from([
            "node-deposit",
            "deposit",
            "--eth",
            "16",
            "--max-fee",
            "20",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn toml_config_fills_missing_args() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "beacon_url = \"http://file:5052\"\nmnemonic_file = \"~/mnemonic\"\n",
        )
        .unwrap();
        let cli = Cli::try_parse_from([
            "node-deposit",
            "--rpc-url",
            "http://cli:8545",
            "version",
        ])
        .unwrap();
        let args = merge_args_from_file::<CliArgs>(cli.config, Some(path)).unwrap();
        assert_eq!(args.rpc_url.as_deref(), Some("http://cli:8545"));
        assert_eq!(args.beacon_url.as_deref(), Some("http://file:5052"));
        assert_eq!(args.mnemonic_file, Some(PathBuf::from("~/mnemonic")));
    }

    #[test]
    fn unsupported_config_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "rpc_url: x").unwrap();
        let cli = Cli::try_parse_from(["node-deposit", "version"]).unwrap();
        assert!(merge_args_from_file::<CliArgs>(cli.config, Some(path)).is_err());
    }
}
