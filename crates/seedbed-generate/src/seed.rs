/// Derive an independent seed for a named stream (FNV-1a over the key).
pub(crate) fn derive_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_seeds_differ_per_key() {
        assert_eq!(derive_seed(7, "base"), derive_seed(7, "base"));
        assert_ne!(derive_seed(7, "base"), derive_seed(7, "conditions"));
        assert_ne!(derive_seed(7, "base"), derive_seed(8, "base"));
    }
}
