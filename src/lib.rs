//pub(crate) mod macros;
pub mod macros;

pub mod beacon;
pub mod config;
pub mod deposit;
pub mod globals;
pub mod helpers;
pub mod logger;
pub mod rocketpool;
pub mod rpc;
pub mod wallet;
