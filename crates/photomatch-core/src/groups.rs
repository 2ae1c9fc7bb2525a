use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;

use crate::error::{ConfigError, LoadError};

/// Built-in device -> group mapping.
pub const DEFAULT_GROUPS: &[(&str, &str)] = &[
    ("PDP1", "Green"),
    ("PDP2", "White"),
    ("PDP3", "Third"),
];

/// Static mapping from device identifier to group name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTable {
    devices: BTreeMap<String, String>,
    /// Group names in order of first appearance
    groups: Vec<String>,
}

impl Default for GroupTable {
    fn default() -> Self {
        let mut table = Self {
            devices: BTreeMap::new(),
            groups: Vec::new(),
        };
        for (device, group) in DEFAULT_GROUPS {
            table.insert(device, group);
        }
        table
    }
}

impl GroupTable {
    /// Build a table from `(device, group)` pairs. Device ids are trimmed.
    pub fn new<I, D, G>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (D, G)>,
        D: AsRef<str>,
        G: AsRef<str>,
    {
        let mut table = Self {
            devices: BTreeMap::new(),
            groups: Vec::new(),
        };
        for (device, group) in pairs {
            let (device, group) = (device.as_ref().trim(), group.as_ref().trim());
            if let Some(existing) = table.devices.get(device) {
                if existing != group {
                    return Err(ConfigError::ConflictingDevice {
                        device: device.to_string(),
                        first: existing.clone(),
                        second: group.to_string(),
                    });
                }
            }
            table.insert(device, group);
        }
        if table.devices.is_empty() {
            return Err(ConfigError::EmptyGroupTable);
        }
        Ok(table)
    }

    /// Load a `{ "DEVICE": "Group", ... }` JSON object.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Cannot open group table {}", path.display()))?;
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Invalid group table {}", path.display()))?;

        let mut pairs = Vec::with_capacity(map.len());
        for (device, group) in map {
            let group = group
                .as_str()
                .with_context(|| format!("Group for device '{}' must be a string", device))?
                .to_string();
            pairs.push((device, group));
        }
        Ok(Self::new(pairs)?)
    }

    fn insert(&mut self, device: &str, group: &str) {
        if !self.groups.iter().any(|g| g == group) {
            self.groups.push(group.to_string());
        }
        self.devices.insert(device.to_string(), group.to_string());
    }

    pub fn group_of(&self, device_id: &str) -> Option<&str> {
        self.devices.get(device_id.trim()).map(String::as_str)
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn contains_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Known device ids, sorted.
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn devices_in<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.devices
            .iter()
            .filter(move |(_, g)| g.as_str() == group)
            .map(|(d, _)| d.as_str())
    }

    /// Fail if any non-empty device id is not in the table.
    /// Unknown ids are reported once each, sorted.
    pub fn validate<'a, I>(&self, device_ids: I) -> Result<(), LoadError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unknown: BTreeSet<&str> = device_ids
            .into_iter()
            .map(str::trim)
            .filter(|id| !id.is_empty() && self.group_of(id).is_none())
            .collect();

        if unknown.is_empty() {
            return Ok(());
        }
        Err(LoadError::UnknownDevices {
            unknown: unknown.into_iter().map(String::from).collect(),
            expected: self.devices().map(String::from).collect(),
        })
    }
}
