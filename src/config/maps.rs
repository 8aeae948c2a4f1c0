//! The fixed map pool used by the elimination draft

/// Ordered pool of draftable maps. The draft eliminates down to one.
pub const MAP_POOL: [&str; 7] = [
    "Anchorage", "Causeway", "Depot", "Foundry", "Gateway", "Quarry", "Terminal",
];

/// The map pool as owned strings, in draft order
pub fn default_map_pool() -> Vec<String> {
    MAP_POOL.iter().map(|m| m.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_has_no_duplicates() {
        let pool = default_map_pool();
        let mut unique = pool.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), pool.len());
    }
}
