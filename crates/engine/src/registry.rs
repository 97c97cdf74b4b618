//! Address registry: the set of tracked addresses and their display labels.
//!
//! Persisted as a flat JSON object (`{"0xabc…": "label"}`), loaded once at
//! startup and rewritten on every mutation. Keys are stored in canonical
//! lowercase form.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use burstwatch_common::address::{canonicalize, normalize};
use burstwatch_common::error::AppError;
use burstwatch_common::types::TrackedAddress;

/// Shared handle to the tracked-address registry.
#[derive(Clone)]
pub struct AddressRegistry {
    path: PathBuf,
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl AddressRegistry {
    /// Load the registry from `path`. A missing file yields an empty registry.
    ///
    /// Entries whose address fails validation are skipped with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();

        let raw: BTreeMap<String, String> = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No registry file found, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut entries = BTreeMap::new();
        for (address, label) in raw {
            match canonicalize(&address) {
                Ok(canonical) => {
                    entries.insert(canonical, label);
                }
                Err(e) => {
                    tracing::warn!(address = %address, error = %e, "Skipping invalid registry entry");
                }
            }
        }

        tracing::info!(
            path = %path.display(),
            addresses = entries.len(),
            "Address registry loaded"
        );

        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    /// Write the current entries back to disk.
    ///
    /// Holds the write guard for the whole write so concurrent saves never
    /// share the temp file.
    pub fn save(&self) -> Result<(), AppError> {
        let entries = self.entries.write();
        Self::persist(&self.path, &entries)
    }

    /// Write a sibling temp file and rename it over the target, so a crash
    /// never leaves a truncated registry. Callers hold the write guard.
    fn persist(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(entries)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Validate, canonicalize and persist a new (or relabelled) address.
    ///
    /// The in-memory change is rolled back if persisting fails.
    pub fn register(&self, address: &str, label: &str) -> Result<TrackedAddress, AppError> {
        let canonical = canonicalize(address)?;
        let label = label.trim().to_string();

        // Insert, persist and rollback happen under one guard.
        let mut entries = self.entries.write();
        let previous = entries.insert(canonical.clone(), label.clone());

        if let Err(e) = Self::persist(&self.path, &entries) {
            match previous {
                Some(old) => entries.insert(canonical.clone(), old),
                None => entries.remove(&canonical),
            };
            return Err(e);
        }
        drop(entries);

        tracing::info!(address = %canonical, label = %label, "Address registered");

        Ok(TrackedAddress {
            address: canonical,
            label,
        })
    }

    /// Display label of an address, if tracked.
    pub fn label(&self, address: &str) -> Option<String> {
        self.entries.read().get(&normalize(address)).cloned()
    }

    /// Label of an address, falling back to the address itself.
    pub fn display_name(&self, address: &str) -> String {
        self.label(address)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| address.to_string())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.read().contains_key(&normalize(address))
    }

    /// All tracked addresses in canonical form.
    pub fn addresses(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// All tracked addresses with labels, sorted by address.
    pub fn entries(&self) -> Vec<TrackedAddress> {
        self.entries
            .read()
            .iter()
            .map(|(address, label)| TrackedAddress {
                address: address.clone(),
                label: label.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B";
    const ADDR_LOWER: &str = "0xab5801a7d398351b8be11c439e05c5b3259aec9b";

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AddressRegistry::load(dir.path().join("wallets.json")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_canonicalizes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        let registry = AddressRegistry::load(&path).unwrap();

        let tracked = registry.register(ADDR, " hot wallet ").unwrap();
        assert_eq!(tracked.address, ADDR_LOWER);
        assert_eq!(tracked.label, "hot wallet");
        assert!(registry.contains(ADDR));
        assert_eq!(registry.label(ADDR).as_deref(), Some("hot wallet"));

        let reloaded = AddressRegistry::load(&path).unwrap();
        assert_eq!(reloaded.addresses(), vec![ADDR_LOWER.to_string()]);
        assert_eq!(reloaded.label(ADDR_LOWER).as_deref(), Some("hot wallet"));
    }

    #[test]
    fn test_register_rejects_malformed_address() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AddressRegistry::load(dir.path().join("wallets.json")).unwrap();

        let err = registry.register("0x1234", "bad").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_rolls_back_when_save_fails() {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            AddressRegistry::load(dir.path().join("missing-dir").join("wallets.json")).unwrap();

        assert!(registry.register(ADDR, "label").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_registrations_all_persist() {
        for _ in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("wallets.json");
            let registry = AddressRegistry::load(&path).unwrap();

            let handles: Vec<_> = (1..=8u8)
                .map(|i| {
                    let registry = registry.clone();
                    std::thread::spawn(move || {
                        registry.register(&format!("0x{:040x}", i), &format!("wallet {i}"))
                    })
                })
                .collect();
            for handle in handles {
                assert!(handle.join().unwrap().is_ok());
            }

            let reloaded = AddressRegistry::load(&path).unwrap();
            assert_eq!(reloaded.len(), 8);
            assert_eq!(
                reloaded.label(&format!("0x{:040x}", 5)).as_deref(),
                Some("wallet 5")
            );
        }
    }

    #[test]
    fn test_load_skips_invalid_and_canonicalizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        std::fs::write(
            &path,
            format!(r#"{{"{ADDR}": "checksummed", "not-an-address": "junk"}}"#),
        )
        .unwrap();

        let registry = AddressRegistry::load(&path).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.label(ADDR_LOWER).as_deref(), Some("checksummed"));
    }

    #[test]
    fn test_load_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let err = AddressRegistry::load(&path).err().unwrap();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn test_display_name_falls_back_to_address() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AddressRegistry::load(dir.path().join("wallets.json")).unwrap();
        registry.register(ADDR, "").unwrap();

        assert_eq!(registry.display_name(ADDR_LOWER), ADDR_LOWER);
        assert_eq!(
            registry.display_name("0x0000000000000000000000000000000000000001"),
            "0x0000000000000000000000000000000000000001"
        );
    }
}
