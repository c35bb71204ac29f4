//! Compiled-in fallback endpoints
//!
//! Used only when a refresh cycle fails completely and the pool has never held
//! a list. Keyed by node type, then network.

const HYPERION_MAINNET: &[&str] =
    &["https://wax.eosusa.news", "https://wax.greymass.com", "https://wax.cryptolions.io"];

const HYPERION_TESTNET: &[&str] = &[
    "https://testnet.waxsweden.org",
    "https://testnet.wax.pink.gg",
    "https://testnet.wax.eosdetroit.io",
];

const ATOMIC_MAINNET: &[&str] = &[
    "https://wax.api.atomicassets.io",
    "https://aa.wax.blacklusion.io",
    "https://wax-aa.eu.eosamsterdam.net",
];

const ATOMIC_TESTNET: &[&str] = &[
    "https://test.wax.api.atomicassets.io",
    "https://atomic-wax-testnet.eosphere.io",
    "https://testatomic.waxsweden.org",
];

/// Node types that have a default table
pub fn known_node_types() -> &'static [&'static str] {
    &["hyperion", "atomic"]
}

/// Networks that have a default table
pub fn known_networks() -> &'static [&'static str] {
    &["mainnet", "testnet"]
}

/// Get the default endpoints for a node type and network
///
/// Returns `None` for unknown combinations; custom node types need a working
/// directory or an existing list.
pub fn default_endpoints(node_type: &str, network: &str) -> Option<&'static [&'static str]> {
    match (node_type, network) {
        ("hyperion", "mainnet") => Some(HYPERION_MAINNET),
        ("hyperion", "testnet") => Some(HYPERION_TESTNET),
        ("atomic", "mainnet") => Some(ATOMIC_MAINNET),
        ("atomic", "testnet") => Some(ATOMIC_TESTNET),
        _ => None,
    }
}
