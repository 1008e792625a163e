use alloy::primitives::Address;
use log::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::{
    config::CliArgs,
    logger::Logger,
    macros::{global, global_set, parse_address},
};

pub struct GlobalData {
    pub logger: Mutex<Logger>,
    pub config: Mutex<CliArgs>,
    pub chain: Mutex<&'static ChainData>,
}

/// Known networks and the storage contract every protocol contract is
/// looked up from
#[derive(Debug, Clone)]
pub struct ChainData {
    pub name: &'static str,
    pub rocket_storage: Address,
}

pub static G: Lazy<GlobalData> = Lazy::new(|| GlobalData {
    logger: Mutex::new(Logger::default()),
    config: Mutex::new(CliArgs::default()),
    chain: Mutex::new(&CHAIN_UNKNOWN),
});

pub fn set_chain(chain_id: &u64) {
    global_set!(chain) = match CHAINDATA.get(&chain_id) {
        Some(cd) => cd,
        None => &CHAIN_UNKNOWN,
    };
    trace!("{:#?}", global!(chain));
}

pub static CHAINDATA: Lazy<HashMap<u64, ChainData>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(1, CHAIN_ETH_MAINNET.clone());
    m.insert(17000, CHAIN_ETH_HOLESKY.clone());
    m.insert(560048, CHAIN_ETH_HOODI.clone());
    m
});

static CHAIN_UNKNOWN: Lazy<ChainData> = Lazy::new(|| ChainData {
    name: "unknown",
    rocket_storage: Address::ZERO,
});

static CHAIN_ETH_MAINNET: Lazy<ChainData> = Lazy::new(|| ChainData {
    name: "mainnet",
    rocket_storage: parse_address!("0x1d8f8f00cfa6758d7bE78336684788Fb0ee0Fa46"),
});

static CHAIN_ETH_HOLESKY: Lazy<ChainData> = Lazy::new(|| ChainData {
    name: "holesky",
    rocket_storage: parse_address!("0x594Fb75D3dc2DFa0150Ad03F99F97817747dd4E1"),
});

// No protocol deployment is known, --storage-address must be supplied
static CHAIN_ETH_HOODI: Lazy<ChainData> = Lazy::new(|| ChainData {
    name: "hoodi",
    rocket_storage: Address::ZERO,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_chain_falls_back() {
        set_chain(&12345);
        assert_eq!(global!(chain).name, "unknown");
        set_chain(&17000);
        assert_eq!(global!(chain).name, "holesky");
        assert_eq!(
            global!(chain).rocket_storage,
            parse_address!("0x594Fb75D3dc2DFa0150Ad03F99F97817747dd4E1")
        );
    }
}
