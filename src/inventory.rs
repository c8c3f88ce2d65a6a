//! Box inventory and flat-rate catalog providers.
//!
//! The packer and the comparator only ever see immutable snapshots. Providers
//! hand out a fresh snapshot per call so a request never observes a catalog
//! changing underneath it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::flat_rate::{FlatRateBox, FlatRateCatalog};
use crate::model::{BoxDefinition, BoxInventory, BoxKind, ValidationError};

/// Error while loading a catalog file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: {source}")]
    Invalid {
        path: String,
        #[source]
        source: ValidationError,
    },
}

/// Source of the merchant's box inventory.
pub trait BoxInventoryProvider {
    fn box_inventory(&self) -> BoxInventory;
}

/// Source of the flat-rate catalog.
pub trait FlatRateCatalogProvider {
    fn flat_rate_boxes(&self) -> FlatRateCatalog;
}

impl BoxInventoryProvider for BoxInventory {
    fn box_inventory(&self) -> BoxInventory {
        self.clone()
    }
}

impl FlatRateCatalogProvider for FlatRateCatalog {
    fn flat_rate_boxes(&self) -> FlatRateCatalog {
        self.clone()
    }
}

/// Catalogs fixed at startup.
#[derive(Clone, Debug)]
pub struct StaticCatalogs {
    inventory: BoxInventory,
    flat_rate: FlatRateCatalog,
}

impl StaticCatalogs {
    pub fn new(inventory: BoxInventory, flat_rate: FlatRateCatalog) -> Self {
        Self {
            inventory,
            flat_rate,
        }
    }
}

impl Default for StaticCatalogs {
    fn default() -> Self {
        Self::new(default_box_inventory(), FlatRateCatalog::usps_default())
    }
}

impl BoxInventoryProvider for StaticCatalogs {
    fn box_inventory(&self) -> BoxInventory {
        self.inventory.clone()
    }
}

impl FlatRateCatalogProvider for StaticCatalogs {
    fn flat_rate_boxes(&self) -> FlatRateCatalog {
        self.flat_rate.clone()
    }
}

/// A small general-purpose box assortment used when no inventory file is
/// configured.
pub fn default_box_inventory() -> BoxInventory {
    let boxes = [
        ("poly_mailer", "Poly mailer", (10.0, 13.0, 1.5), 64.0, 0.5, BoxKind::Soft),
        ("small_box", "Small box", (8.0, 6.0, 4.0), 320.0, 3.0, BoxKind::Rigid),
        ("medium_box", "Medium box", (12.0, 10.0, 8.0), 640.0, 6.0, BoxKind::Rigid),
        ("large_box", "Large box", (18.0, 14.0, 12.0), 1120.0, 12.0, BoxKind::Rigid),
        ("xl_box", "Extra large box", (24.0, 18.0, 18.0), 1120.0, 20.0, BoxKind::Rigid),
    ];

    let entries: BTreeMap<String, BoxDefinition> = boxes
        .into_iter()
        .map(|(key, name, (length, width, height), max_weight, tare_weight, kind)| {
            (
                key.to_string(),
                BoxDefinition {
                    name: Some(name.to_string()),
                    length,
                    width,
                    height,
                    max_weight,
                    tare_weight,
                    kind,
                },
            )
        })
        .collect();

    BoxInventory::from_trusted(entries)
}

/// Loads a box inventory from a JSON object of `key → BoxDefinition`.
pub fn load_box_inventory(path: impl AsRef<Path>) -> Result<BoxInventory, ConfigError> {
    let path = path.as_ref();
    let boxes: BTreeMap<String, BoxDefinition> = read_json(path)?;
    BoxInventory::new(boxes).map_err(|source| ConfigError::Invalid {
        path: path.display().to_string(),
        source,
    })
}

/// Loads a flat-rate catalog from a JSON object of `key → FlatRateBox`.
pub fn load_flat_rate_catalog(path: impl AsRef<Path>) -> Result<FlatRateCatalog, ConfigError> {
    let path = path.as_ref();
    let boxes: BTreeMap<String, FlatRateBox> = read_json(path)?;
    FlatRateCatalog::new(boxes).map_err(|source| ConfigError::Invalid {
        path: path.display().to_string(),
        source,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: path.display().to_string(),
        source,
    })
}
