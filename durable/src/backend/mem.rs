//! In-memory kv backend for development and testing.

use crate::{check_key, Kv, StoreError};
use std::collections::HashMap;

/// In-memory kv store.
///
/// Survives "reboots" simulated by moving the store between ring instances;
/// `fail_next_puts` injects write faults to exercise the persist-fault
/// policy.
#[derive(Debug, Default, Clone)]
pub struct MemKv {
    map: HashMap<String, Vec<u8>>,
    fail_puts: u32,
}

impl MemKv {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` puts fail with a backend error
    pub fn fail_next_puts(&mut self, n: u32) {
        self.fail_puts = n;
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Kv for MemKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        check_key(key)?;
        Ok(self.map.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        check_key(key)?;
        if self.fail_puts > 0 {
            self.fail_puts -= 1;
            return Err(StoreError::Backend("injected put fault".to_string()));
        }
        self.map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn erase(&mut self, key: &str) -> Result<(), StoreError> {
        check_key(key)?;
        self.map.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_kv_basic() {
        let mut kv = MemKv::new();
        assert_eq!(kv.get("tx_seq").unwrap(), None);

        kv.put("tx_seq", &[1, 2, 3]).unwrap();
        assert_eq!(kv.get("tx_seq").unwrap(), Some(vec![1, 2, 3]));

        kv.erase("tx_seq").unwrap();
        assert_eq!(kv.get("tx_seq").unwrap(), None);
        kv.erase("tx_seq").unwrap();
    }

    #[test]
    fn test_key_validation() {
        let mut kv = MemKv::new();
        assert!(kv.put("q0_d", b"x").is_ok());
        assert!(kv.put("", b"x").is_err());
        assert!(kv.put("a key with spaces", b"x").is_err());
        assert!(kv.put("way_too_long_key_name", b"x").is_err());
    }

    #[test]
    fn test_fault_injection() {
        let mut kv = MemKv::new();
        kv.fail_next_puts(1);
        assert!(kv.put("k", b"x").is_err());
        assert!(kv.put("k", b"x").is_ok());
    }
}
