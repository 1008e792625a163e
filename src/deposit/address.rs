use alloy::{
    primitives::{Address, B256, Bytes, U256, keccak256},
    sol_types::SolValue,
};

use super::types::DepositType;

/// Everything needed to compute a minipool address offline: the CREATE2
/// deployer, the storage contract handed to the minipool constructor
/// and the minipool creation bytecode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressTemplate {
    pub deployer: Address,
    pub storage: Address,
    pub bytecode: Bytes,
}

impl AddressTemplate {
    pub fn new(deployer: Address, storage: Address, bytecode: Bytes) -> Self {
        AddressTemplate {
            deployer,
            storage,
            bytecode,
        }
    }

    /// keccak256(abi.encodePacked(owner, salt))
    pub fn node_salt(owner: Address, salt: U256) -> B256 {
        let mut packed = Vec::with_capacity(20 + 32);
        packed.extend_from_slice(owner.as_slice());
        packed.extend_from_slice(&salt.to_be_bytes::<32>());
        keccak256(packed)
    }

    /// Minipool bytecode followed by its abi encoded constructor arguments
    pub fn init_code(&self, owner: Address, class: DepositType) -> Vec<u8> {
        let args = (self.storage, owner, U256::from(class.as_u8())).abi_encode_params();
        let mut code = Vec::with_capacity(self.bytecode.len() + args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(&args);
        code
    }

    /// Deterministic minipool address for (owner, class, salt), no I/O
    pub fn derive(&self, owner: Address, class: DepositType, salt: U256) -> Address {
        self.deployer.create2_from_code(
            Self::node_salt(owner, salt).0,
            self.init_code(owner, class),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_address;

    fn template() -> AddressTemplate {
        AddressTemplate::new(
            parse_address!("0x6293B8abC1F36aFB22406Be5f96D893072A8cF3a"),
            parse_address!("0x1d8f8f00cfa6758d7bE78336684788Fb0ee0Fa46"),
            Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52, 0x34, 0x80, 0x15]),
        )
    }

    #[test]
    fn derivation_is_deterministic() {
        let owner = parse_address!("0x28eb85aa9c01011fe9f62aee4c4446db069bc753");
        let a = template().derive(owner, DepositType::Half, U256::from(42));
        let b = template().derive(owner, DepositType::Half, U256::from(42));
        assert_eq!(a, b);
    }

    #[test]
    fn every_input_changes_the_address() {
        let owner = parse_address!("0x28eb85aa9c01011fe9f62aee4c4446db069bc753");
        let other = parse_address!("0xbf9f307eb4fb144a3225c077a39aa91c373a470e");
        let base = template().derive(owner, DepositType::Half, U256::from(42));
        assert_ne!(base, template().derive(other, DepositType::Half, U256::from(42)));
        assert_ne!(base, template().derive(owner, DepositType::Full, U256::from(42)));
        assert_ne!(base, template().derive(owner, DepositType::Half, U256::from(43)));

        let mut moved = template();
        moved.deployer = other;
        assert_ne!(base, moved.derive(owner, DepositType::Half, U256::from(42)));
    }

    #[test]
    fn matches_create2_formula() {
        let t = template();
        let owner = parse_address!("0x28eb85aa9c01011fe9f62aee4c4446db069bc753");
        let salt = U256::from(7);
        let init_hash = keccak256(t.init_code(owner, DepositType::Empty));

        let mut preimage = vec![0xffu8];
        preimage.extend_from_slice(t.deployer.as_slice());
        preimage.extend_from_slice(AddressTemplate::node_salt(owner, salt).as_slice());
        preimage.extend_from_slice(init_hash.as_slice());
        let expected = Address::from_slice(&keccak256(preimage)[12..]);

        assert_eq!(t.derive(owner, DepositType::Empty, salt), expected);
    }

    #[test]
    fn init_code_layout() {
        let t = template();
        let owner = parse_address!("0x28eb85aa9c01011fe9f62aee4c4446db069bc753");
        let code = t.init_code(owner, DepositType::Half);
        assert_eq!(code.len(), t.bytecode.len() + 3 * 32);
        assert_eq!(&code[..t.bytecode.len()], t.bytecode.as_ref());
        assert_eq!(code[code.len() - 1], 2);
    }
}
