// -
// History sizing

/// Hard ceiling on a single history buffer
pub const MAX_COLLECTION_SIZE: usize = 10_000;
/// Capacity used when a requested size falls outside `[1, MAX_COLLECTION_SIZE]`
pub const DEFAULT_COLLECTION_SIZE: usize = 1_000;

// -
// Sampled watches

/// Consecutive empty reads tolerated before a sampled watch cancels itself
pub const SAMPLE_MISS_LIMIT: u32 = 3;

/// Well-known system metric identifiers served by the compute-resource
/// collaborator instead of the registry's own table.
pub mod system_watch_id {
    pub const CPU: &str = "CPU";
    pub const SYSTEM_MEMORY: &str = "Memory";
    pub const DISK_SPACE: &str = "Disk Space";
    pub const LOAD_AVERAGE: &str = "Load";

    /// All identifiers owned by the compute-resource collaborator
    pub const ALL: [&str; 4] = [CPU, SYSTEM_MEMORY, DISK_SPACE, LOAD_AVERAGE];

    pub fn is_system_id(id: &str) -> bool {
        ALL.contains(&id)
    }
}
