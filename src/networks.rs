//! Known token contracts and preset sale contracts by chain id.

use crate::errors::{LandSaleError, Result};
use crate::types::AssetKind;
use crate::utils::parse_address;
use ethers::types::Address;
use std::collections::HashMap;

/// Ethereum mainnet.
pub const ETHEREUM_MAINNET: u64 = 1;

/// Tether USD on Ethereum mainnet, `0xdAC17F958D2ee523a2206206994597C13D831ec7`.
const USDT_MAINNET: [u8; 20] = [
    0xda, 0xc1, 0x7f, 0x95, 0x8d, 0x2e, 0xe5, 0x23, 0xa2, 0x20, 0x62, 0x06, 0x99, 0x45, 0x97, 0xc1, 0x3d,
    0x83, 0x1e, 0xc7,
];

/// USD Coin on Ethereum mainnet, `0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606EB48`.
const USDC_MAINNET: [u8; 20] = [
    0xa0, 0xb8, 0x69, 0x91, 0xc6, 0x21, 0x8b, 0x36, 0xc1, 0xd1, 0x9d, 0x4a, 0x2e, 0x9e, 0xb0, 0xce, 0x36,
    0x06, 0xeb, 0x48,
];

/// An ERC-20 token deployment on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    /// Token contract
    pub address: Address,

    /// Decimals declared by the token
    pub decimals: u8,
}

/// Lookup of stablecoin deployments per chain.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    entries: HashMap<(u64, AssetKind), TokenInfo>,
}

impl TokenTable {
    /// An empty table.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table: USDT and USDC on Ethereum mainnet.
    pub fn with_defaults() -> Self {
        let mut table = Self::empty();
        table.entries.insert(
            (ETHEREUM_MAINNET, AssetKind::Usdt),
            TokenInfo {
                address: Address::from(USDT_MAINNET),
                decimals: 6,
            },
        );
        table.entries.insert(
            (ETHEREUM_MAINNET, AssetKind::Usdc),
            TokenInfo {
                address: Address::from(USDC_MAINNET),
                decimals: 6,
            },
        );
        table
    }

    /// Registers a token deployment, replacing any previous entry.
    ///
    /// Only ERC-20 assets can be registered.
    pub fn insert(&mut self, chain_id: u64, asset: AssetKind, address: &str, decimals: u8) -> Result<()> {
        if !asset.is_token() {
            return Err(LandSaleError::ConfigError(format!(
                "{} is not an ERC-20 asset",
                asset
            )));
        }
        let address = parse_address(address)?;
        self.entries.insert((chain_id, asset), TokenInfo { address, decimals });
        Ok(())
    }

    /// Finds the deployment of `asset` on `chain_id`.
    pub fn lookup(&self, chain_id: u64, asset: AssetKind) -> Result<TokenInfo> {
        self.entries
            .get(&(chain_id, asset))
            .copied()
            .ok_or_else(|| LandSaleError::UnsupportedToken {
                asset: asset.to_string(),
                chain_id,
            })
    }
}

/// Pre-deployed sale contracts, applied when a wallet connects.
#[derive(Debug, Clone, Default)]
pub struct PresetContracts {
    by_chain: HashMap<u64, Address>,
}

impl PresetContracts {
    /// Sets the contract for `chain_id`.
    pub fn insert(&mut self, chain_id: u64, address: &str) -> Result<()> {
        let address = parse_address(address)?;
        self.by_chain.insert(chain_id, address);
        Ok(())
    }

    /// The contract for `chain_id`, if one is configured.
    pub fn get(&self, chain_id: u64) -> Option<Address> {
        self.by_chain.get(&chain_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = TokenTable::with_defaults();
        let usdt = table.lookup(1, AssetKind::Usdt).unwrap();
        assert_eq!(usdt.decimals, 6);
        assert_eq!(
            usdt.address,
            "0xdAC17F958D2ee523a2206206994597C13D831ec7".parse().unwrap()
        );
        let usdc = table.lookup(1, AssetKind::Usdc).unwrap();
        assert_eq!(
            usdc.address,
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606EB48".parse().unwrap()
        );
        assert_ne!(usdc.address, Address::zero());
    }

    #[test]
    fn test_unknown_chain() {
        let table = TokenTable::with_defaults();
        let err = table.lookup(11155111, AssetKind::Usdc).unwrap_err();
        assert!(matches!(
            err,
            LandSaleError::UnsupportedToken { chain_id: 11155111, .. }
        ));
    }

    #[test]
    fn test_insert_rejects_native_assets() {
        let mut table = TokenTable::empty();
        assert!(table
            .insert(1, AssetKind::Eth, "0xdAC17F958D2ee523a2206206994597C13D831ec7", 18)
            .is_err());
        table
            .insert(11155111, AssetKind::Usdc, "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238", 6)
            .unwrap();
        assert!(table.lookup(11155111, AssetKind::Usdc).is_ok());
    }

    #[test]
    fn test_presets() {
        let mut presets = PresetContracts::default();
        assert!(presets.insert(1, "0xYourMainnetContractAddressHere").is_err());
        presets
            .insert(1, "0x5FbDB2315678afecb367f032d93F642f64180aa3")
            .unwrap();
        assert!(presets.get(1).is_some());
        assert!(presets.get(5).is_none());
    }
}
