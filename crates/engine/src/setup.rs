//! One-time database setup
//!
//! Everything the database needs before its first operation: the type
//! registry with the built-in persisted types, the random generator and a
//! memory sample for the startup log. Nothing here is process-global.

use rand::rngs::StdRng;
use rand::SeedableRng;
use shardb_core::{Element, ShardOffset};
use shardb_durability::TypeRegistry;
use shardb_storage::ShardMeta;
use tracing::debug;

use crate::collection::CollectionDescriptor;

/// Register the types every database persists
pub fn register_builtin_types(registry: &TypeRegistry) {
    registry.register_name::<ShardOffset>("so");
    registry.register_name::<ShardMeta>("sh");
    registry.register_name::<CollectionDescriptor>("cl");
    registry.register_name::<Element>("el");
}

/// Random generator from a fixed seed, or OS entropy
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Process memory usage in kilobytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryProfile {
    /// Resident set size
    pub resident_kb: Option<u64>,
    /// Virtual memory size
    pub virtual_kb: Option<u64>,
}

impl MemoryProfile {
    /// Sample the current process
    ///
    /// Only Linux exposes these numbers; elsewhere both fields are `None`.
    pub fn sample() -> Self {
        let profile = std::fs::read_to_string("/proc/self/status")
            .map(|status| MemoryProfile::parse(&status))
            .unwrap_or_default();
        debug!(
            target: "shardb::db",
            resident_kb = ?profile.resident_kb,
            virtual_kb = ?profile.virtual_kb,
            "Memory profile"
        );
        profile
    }

    /// Parse the `VmRSS`/`VmSize` lines of a `/proc/<pid>/status` file
    pub fn parse(status: &str) -> Self {
        let field = |name: &str| {
            status
                .lines()
                .find_map(|line| line.strip_prefix(name))
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|kb| kb.parse().ok())
        };
        MemoryProfile {
            resident_kb: field("VmRSS:"),
            virtual_kb: field("VmSize:"),
        }
    }
}
