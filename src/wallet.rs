use colored::*;
use eyre::{Result, WrapErr, bail, eyre};
use log::*;
use serde_derive::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use alloy::{
    primitives::{Address, U256, hex},
    signers::local::{
        PrivateKeySigner,
        coins_bip39::{English, Mnemonic},
    },
};

use crate::{
    deposit::{BlsPublicKey, TransactionParams, ValidatorKey, traits::KeyVault},
    helpers,
};

const WALLET_STATE: &str = "wallet.json";
const VALIDATOR_KEYSTORES: &str = "validators";

/// Expands `~` and env vars then reads the file, trailing whitespace stripped
pub fn read_secret_file(path: &Path) -> Result<String> {
    let filepath = shellexpand::full(
        path.to_str()
            .ok_or_else(|| eyre!("invalid path {:?}", path))?,
    )?
    .to_string();
    let content =
        std::fs::read_to_string(&filepath).wrap_err_with(|| format!("reading '{}'", filepath))?;
    Ok(content.trim().to_string())
}

/// EIP-2334 signing key path of the validator at `index`
pub fn validator_path(index: u32) -> String {
    format!("m/12381/3600/{}/0/0", index)
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct WalletState {
    next_validator_index: u32,
}

/// Node account plus the validator keys derived from the node mnemonic
pub struct NodeWallet {
    datadir: PathBuf,
    password: String,
    signer: PrivateKeySigner,
    seed: [u8; 64],
    state: WalletState,
    pending: Option<(u32, ValidatorKey)>,
}

impl NodeWallet {
    pub fn load(
        datadir: &Path,
        keystore: &Path,
        password_file: &Path,
        mnemonic_file: &Path,
    ) -> Result<NodeWallet> {
        let password = read_secret_file(password_file)?;
        let secret = eth_keystore::decrypt_key(keystore, &password)
            .map_err(|e| eyre!("unable to decrypt {}: {:?}", keystore.display(), e))?;
        let signer = PrivateKeySigner::from_slice(&secret)?;
        let phrase = read_secret_file(mnemonic_file)?;
        let wallet = NodeWallet::new(datadir, &password, signer, &phrase)?;
        debug!(
            "{} {} {} {}",
            "Node account".white().bold(),
            wallet.signer.address().to_string().blue(),
            "next validator index".white().bold(),
            wallet.state.next_validator_index.to_string().magenta()
        );
        Ok(wallet)
    }

    pub fn new(
        datadir: &Path,
        password: &str,
        signer: PrivateKeySigner,
        mnemonic_phrase: &str,
    ) -> Result<NodeWallet> {
        let mnemonic = Mnemonic::<English>::new_from_phrase(mnemonic_phrase.trim())?;
        let seed = mnemonic.to_seed(None)?;
        let state_path = datadir.join(WALLET_STATE);
        let state = match state_path.exists() {
            true => {
                let file = std::fs::File::open(&state_path)?;
                serde_json::from_reader::<_, WalletState>(&file)
                    .wrap_err_with(|| format!("{:?}", state_path))?
            }
            false => WalletState::default(),
        };
        Ok(NodeWallet {
            datadir: datadir.to_path_buf(),
            password: password.to_string(),
            signer,
            seed,
            state,
            pending: None,
        })
    }

    pub fn signer(&self) -> PrivateKeySigner {
        self.signer.clone()
    }

    pub fn next_validator_index(&self) -> u32 {
        self.state.next_validator_index
    }

    pub fn keystore_dir(&self) -> PathBuf {
        self.datadir.join(VALIDATOR_KEYSTORES)
    }

    pub fn keystore_path(&self, pubkey: &BlsPublicKey) -> PathBuf {
        self.keystore_dir()
            .join(format!("{}.json", hex::encode(pubkey)))
    }

    fn validator_key_at(&self, index: u32) -> Result<ValidatorKey> {
        let master = blst::min_pk::SecretKey::derive_master_eip2333(&self.seed)
            .map_err(|e| eyre!("EIP-2333 master key derivation failed: {:?}", e))?;
        let sk = master
            .derive_child_eip2333(12381)
            .derive_child_eip2333(3600)
            .derive_child_eip2333(index)
            .derive_child_eip2333(0)
            .derive_child_eip2333(0);
        let key = ValidatorKey::from(sk);
        trace!("{}: {}", validator_path(index), key.public_key());
        Ok(key)
    }

    fn save_state(&self) -> Result<()> {
        std::fs::create_dir_all(&self.datadir)?;
        let path = self.datadir.join(WALLET_STATE);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        serde_json::to_writer_pretty(&mut file, &self.state)?;
        Ok(())
    }
}

/// Decrypts a validator keystore written by [`NodeWallet`], the recorded
/// public key is kept as is so a mismatching keystore is detectable
pub fn load_validator_key(keypath: &Path, password: &str) -> Result<ValidatorKey> {
    let secret = eth_keystore::decrypt_key(keypath, password)
        .map_err(|e| eyre!("unable to decrypt {}: {:?}", keypath.display(), e))?;
    let file = std::fs::File::open(keypath)?;
    let json = serde_json::from_reader::<_, serde_json::Value>(&file)?;
    let pubkey = match json.get("pubkey").and_then(|value| value.as_str()) {
        Some(pubkey) => pubkey.parse::<BlsPublicKey>()?,
        None => bail!("keystore {} has no pubkey", keypath.display()),
    };
    ValidatorKey::from_keystore(&secret, pubkey)
}

impl KeyVault for NodeWallet {
    fn account_address(&self) -> Result<Address> {
        Ok(self.signer.address())
    }

    fn next_validator_key(&self) -> Result<ValidatorKey> {
        self.validator_key_at(self.state.next_validator_index)
    }

    fn create_validator_key(&mut self) -> Result<ValidatorKey> {
        let index = self.state.next_validator_index;
        let key = self.validator_key_at(index)?;
        self.pending = Some((index, key.clone()));
        Ok(key)
    }

    fn persist(&mut self) -> Result<()> {
        let Some((index, key)) = self.pending.take() else {
            return Ok(());
        };
        let dir = self.keystore_dir();
        std::fs::create_dir_all(&dir)?;

        let pubkey = key.public_key();
        let keypath = self.keystore_path(&pubkey);
        let filename = keypath
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| eyre!("invalid keystore path {:?}", keypath))?
            .to_string();

        let mut rng = rand::thread_rng();
        let write = eth_keystore::v4::encrypt_key(
            dir,
            &mut rng,
            &key.to_bytes(),
            &self.password,
            Some(&filename),
        )
        .map_err(|e| eyre!("{:?}", e))
        .and_then(|_| {
            helpers::json::update(
                &keypath,
                vec![
                    ("pubkey", hex::encode(pubkey)),
                    ("path", validator_path(index)),
                ],
            )
        });
        if let Err(e) = write {
            // Keep the key around so a later save can retry
            self.pending = Some((index, key));
            return Err(e.wrap_err(format!("saving validator keystore {:?}", keypath)));
        }

        self.state.next_validator_index = index + 1;
        self.save_state()?;
        info!(
            "{} {} {}",
            "Validator key".white().bold(),
            pubkey.to_string().blue(),
            format!("saved to {}", keypath.display()).green()
        );
        Ok(())
    }

    fn transaction_params(&self, value: U256) -> Result<TransactionParams> {
        Ok(TransactionParams::new(self.signer.address(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_address;

    const PHRASE: &str = "budget squeeze faculty width cousin cake vanish start grocery card elegant reopen pencil traffic minute";

    fn wallet(dir: &Path) -> NodeWallet {
        let signer = PrivateKeySigner::from_slice(&[0x11; 32]).unwrap();
        NodeWallet::new(dir, "testpassword", signer, PHRASE).unwrap()
    }

    #[test]
    fn derivation_is_stable_until_persist() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = wallet(dir.path());

        let peek = w.next_validator_key().unwrap();
        let created = w.create_validator_key().unwrap();
        assert_eq!(peek.public_key(), created.public_key());

        // Not persisted, a retry hands out the same key
        let again = w.create_validator_key().unwrap();
        assert_eq!(created.public_key(), again.public_key());
        assert_eq!(w.next_validator_index(), 0);
        assert!(!w.keystore_dir().exists());
    }

    #[test]
    fn persist_writes_keystore_and_advances() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = wallet(dir.path());
        let key = w.create_validator_key().unwrap();
        w.persist().unwrap();
        assert_eq!(w.next_validator_index(), 1);

        let keypath = w.keystore_path(&key.public_key());
        let loaded = load_validator_key(&keypath, "testpassword").unwrap();
        assert_eq!(loaded.public_key(), key.public_key());
        assert!(loaded.is_consistent());

        // Next key differs and the index survives a reload
        let next = w.next_validator_key().unwrap();
        assert_ne!(next.public_key(), key.public_key());
        let reloaded = wallet(dir.path());
        assert_eq!(reloaded.next_validator_index(), 1);
        assert_eq!(
            reloaded.next_validator_key().unwrap().public_key(),
            next.public_key()
        );

        // Nothing pending, nothing to do
        w.persist().unwrap();
        assert_eq!(w.next_validator_index(), 1);
    }

    #[test]
    fn account_and_params() {
        let dir = tempfile::tempdir().unwrap();
        let w = wallet(dir.path());
        let addr = w.account_address().unwrap();
        let params = w.transaction_params(U256::from(5)).unwrap();
        assert_eq!(params.from, addr);
        assert_eq!(params.value, U256::from(5));
        assert_ne!(addr, parse_address!("0x0000000000000000000000000000000000000000"));
        assert!(params.nonce.is_none() && !params.no_send);
    }

    #[test]
    fn secret_files_are_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("password");
        std::fs::write(&path, "hunter2\n").unwrap();
        assert_eq!(read_secret_file(&path).unwrap(), "hunter2");
        assert!(read_secret_file(&dir.path().join("missing")).is_err());
    }
}
