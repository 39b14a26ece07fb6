//! Known terminals

use std::collections::HashSet;

use zkattend_types::DeviceDescriptor;

use crate::config::DeviceEntry;
use crate::error::{Error, Result};

/// Ordered key → terminal table, fixed after construction
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<(String, DeviceDescriptor)>,
}

impl Registry {
    /// Build from configuration entries
    ///
    /// Keys default to the entry's 1-based position. Keys and names must be
    /// unique; addresses may repeat.
    pub fn from_config(entries: &[DeviceEntry]) -> Result<Self> {
        let mut keys = HashSet::new();
        let mut names = HashSet::new();
        let mut table = Vec::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            let key = entry
                .key
                .as_deref()
                .map(str::trim)
                .map(str::to_string)
                .unwrap_or_else(|| (index + 1).to_string());
            if key.is_empty() {
                return Err(Error::Config(format!("device '{}' has an empty key", entry.name)));
            }

            let device = DeviceDescriptor::parse(entry.name.trim(), &entry.address)
                .map_err(|e| Error::Config(format!("device '{}': {}", entry.name, e)))?;

            if !keys.insert(key.clone()) {
                return Err(Error::Config(format!("duplicate device key '{}'", key)));
            }
            if !names.insert(device.name.clone()) {
                return Err(Error::Config(format!("duplicate device name '{}'", device.name)));
            }

            table.push((key, device));
        }

        Ok(Self { entries: table })
    }

    pub fn get(&self, key: &str) -> Option<&DeviceDescriptor> {
        let key = key.trim();
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, device)| device)
    }

    /// `(key, device)` pairs in menu order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeviceDescriptor)> {
        self.entries.iter().map(|(key, device)| (key.as_str(), device))
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.entries.iter().map(|(_, device)| device)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    #[test]
    fn test_default_table() {
        let registry = Registry::from_config(&Config::default().devices).unwrap();
        assert_eq!(registry.len(), 7);

        let keys: Vec<_> = registry.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["1", "2", "3", "4", "5", "6", "7"]);

        let head = registry.get(" 2 ").unwrap();
        assert_eq!(head.name, "HeadOffice");
        assert_eq!(head.address, Ipv4Addr::new(10, 10, 10, 201));
        assert!(registry.get("8").is_none());
    }

    #[test]
    fn test_explicit_keys_and_ports() {
        let mut annex = DeviceEntry::new("Annex", "10.0.0.6:5005");
        annex.key = Some("a".into());
        let registry =
            Registry::from_config(&[DeviceEntry::new("Lab", "10.0.0.5"), annex]).unwrap();

        assert_eq!(registry.get("1").unwrap().name, "Lab");
        assert_eq!(registry.get("a").unwrap().port, Some(5005));
        assert!(registry.get("2").is_none());
    }

    #[test]
    fn test_rejects_duplicates_and_bad_addresses() {
        let dup_name = [
            DeviceEntry::new("Lab", "10.0.0.5"),
            DeviceEntry::new("Lab", "10.0.0.6"),
        ];
        assert!(matches!(
            Registry::from_config(&dup_name),
            Err(Error::Config(_))
        ));

        let mut second = DeviceEntry::new("Annex", "10.0.0.6");
        second.key = Some("1".into());
        let dup_key = [DeviceEntry::new("Lab", "10.0.0.5"), second];
        assert!(matches!(
            Registry::from_config(&dup_key),
            Err(Error::Config(_))
        ));

        assert!(matches!(
            Registry::from_config(&[DeviceEntry::new("Lab", "lab.local")]),
            Err(Error::Config(_))
        ));
    }
}
