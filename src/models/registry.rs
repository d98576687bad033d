use std::collections::{HashMap, HashSet};

use crate::config::ChainConfig;
use crate::error::RegistryError;

/// Tracked addresses and token contracts of one chain, lowercase `0x`-prefixed
#[derive(Debug, Clone, Default)]
pub struct ChainTracking {
    addresses: HashSet<String>,
    tokens: HashSet<String>,
}

impl ChainTracking {
    pub fn new<A, T>(addresses: A, tokens: T) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        Self {
            addresses: addresses
                .into_iter()
                .map(|a| normalize_address(a.as_ref()))
                .filter(|a| !a.is_empty())
                .collect(),
            tokens: tokens
                .into_iter()
                .map(|t| normalize_address(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// Read-only membership sets per chain, built once at startup.
///
/// Shared between chain tasks behind an `Arc`; nothing mutates it after construction.
#[derive(Debug, Clone, Default)]
pub struct TrackedRegistry {
    chains: HashMap<String, ChainTracking>,
}

impl TrackedRegistry {
    /// Build the registry from the configured chains
    pub fn from_chains(chains: &[ChainConfig]) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for chain in chains {
            registry.insert(
                &chain.name,
                ChainTracking::new(chain.all_tracked_addresses(), &chain.tracked_tokens),
            )?;
        }
        Ok(registry)
    }

    /// Add one chain's sets. Only used while building.
    pub fn insert(&mut self, chain: &str, tracking: ChainTracking) -> Result<(), RegistryError> {
        if self.chains.contains_key(chain) {
            return Err(RegistryError::DuplicateChain(chain.to_string()));
        }
        self.chains.insert(chain.to_string(), tracking);
        Ok(())
    }

    pub fn with_chain(mut self, chain: &str, tracking: ChainTracking) -> Result<Self, RegistryError> {
        self.insert(chain, tracking)?;
        Ok(self)
    }

    /// Fail fast when a chain has no registry entry
    pub fn ensure_chain(&self, chain: &str) -> Result<(), RegistryError> {
        if self.chains.contains_key(chain) {
            Ok(())
        } else {
            Err(RegistryError::UnknownChain(chain.to_string()))
        }
    }

    /// Case-insensitive tracked-address check. The empty address is never tracked.
    pub fn is_tracked_address(&self, chain: &str, address: &str) -> bool {
        let normalized = normalize_address(address);
        if normalized.is_empty() {
            return false;
        }
        self.chains
            .get(chain)
            .map_or(false, |tracking| tracking.addresses.contains(&normalized))
    }

    /// Case-insensitive tracked-token check
    pub fn is_tracked_token(&self, chain: &str, address: &str) -> bool {
        let normalized = normalize_address(address);
        if normalized.is_empty() {
            return false;
        }
        self.chains
            .get(chain)
            .map_or(false, |tracking| tracking.tokens.contains(&normalized))
    }

    pub fn chain(&self, chain: &str) -> Option<&ChainTracking> {
        self.chains.get(chain)
    }
}

/// Normalize an address to lowercase with a `0x` prefix. Blank input stays empty.
pub fn normalize_address(address: &str) -> String {
    let addr = address.trim();
    let without_prefix = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .unwrap_or(addr);
    if without_prefix.is_empty() {
        return String::new();
    }
    format!("0x{}", without_prefix.to_lowercase())
}

/// Validate the 20-byte hex address format, with or without `0x`
pub fn is_valid_address(address: &str) -> bool {
    let normalized = normalize_address(address);
    let hex = normalized.strip_prefix("0x").unwrap_or(&normalized);
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACKED: &str = "0xF977814e90dA44bFA03b6295A0616a897441aceC";
    const TOKEN: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

    fn registry() -> TrackedRegistry {
        TrackedRegistry::default()
            .with_chain("ethereum", ChainTracking::new([TRACKED], [TOKEN]))
            .unwrap()
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address(TRACKED), "0xf977814e90da44bfa03b6295a0616a897441acec");
        assert_eq!(
            normalize_address("F977814E90DA44BFA03B6295A0616A897441ACEC"),
            "0xf977814e90da44bfa03b6295a0616a897441acec"
        );
        assert_eq!(normalize_address("  0X12ab "), "0x12ab");
        assert_eq!(normalize_address(""), "");
        assert_eq!(normalize_address("0x"), "");
    }

    #[test]
    fn test_is_valid_address() {
        assert!(is_valid_address(TRACKED));
        assert!(is_valid_address("f977814e90da44bfa03b6295a0616a897441acec"));
        assert!(!is_valid_address("0xf977814e90da44bfa03b6295a0616a897441ace"));
        assert!(!is_valid_address("0xg977814e90da44bfa03b6295a0616a897441acec"));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn test_tracked_address_is_case_insensitive() {
        let registry = registry();
        let variants = [
            TRACKED.to_string(),
            TRACKED.to_lowercase(),
            TRACKED.to_uppercase().replacen("0X", "0x", 1),
            TRACKED.trim_start_matches("0x").to_string(),
        ];
        for variant in variants {
            assert!(registry.is_tracked_address("ethereum", &variant), "{}", variant);
        }
        assert!(!registry.is_tracked_address("ethereum", "0x1234567890123456789012345678901234567890"));
    }

    #[test]
    fn test_tracked_token_is_case_insensitive() {
        let registry = registry();
        assert!(registry.is_tracked_token("ethereum", TOKEN));
        assert!(registry.is_tracked_token("ethereum", &TOKEN.to_lowercase()));
        assert!(!registry.is_tracked_token("ethereum", TRACKED));
    }

    #[test]
    fn test_empty_address_never_tracked() {
        let registry = TrackedRegistry::default()
            .with_chain("ethereum", ChainTracking::new(["", TRACKED], Vec::<String>::new()))
            .unwrap();
        assert!(!registry.is_tracked_address("ethereum", ""));
        assert_eq!(registry.chain("ethereum").unwrap().address_count(), 1);
        assert_eq!(registry.chain("ethereum").unwrap().token_count(), 0);
    }

    #[test]
    fn test_chains_are_isolated() {
        let registry = registry()
            .with_chain("polygon", ChainTracking::new(Vec::<String>::new(), Vec::<String>::new()))
            .unwrap();
        assert!(registry.is_tracked_address("ethereum", TRACKED));
        assert!(!registry.is_tracked_address("polygon", TRACKED));
        assert!(!registry.is_tracked_address("base", TRACKED));
    }

    #[test]
    fn test_ensure_chain() {
        let registry = registry();
        assert!(registry.ensure_chain("ethereum").is_ok());
        assert_eq!(
            registry.ensure_chain("base"),
            Err(RegistryError::UnknownChain("base".to_string()))
        );
    }

    #[test]
    fn test_duplicate_chain_rejected() {
        let result = registry().with_chain("ethereum", ChainTracking::default());
        assert!(matches!(result, Err(RegistryError::DuplicateChain(_))));
    }
}
