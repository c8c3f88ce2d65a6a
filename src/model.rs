//! Data models for cart packing.
//!
//! This module defines the fundamental data structures of the packing pipeline:
//! - `CartLine`: An item definition with a quantity, as it arrives from the cart
//! - `Item`: One physical unit to ship, produced by `expand_cart`
//! - `BoxDefinition` / `BoxInventory`: Candidate shipping boxes
//! - `PackedBox`: The packer's working accumulator
//! - `Package`: A finalized box as handed to rating and label printing

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{Dimensional, Dims, OUNCES_PER_POUND, Weighted, round2, validation};

/// Box type reported for packages created when no inventory box fits.
pub const CUSTOM_BOX_TYPE: &str = "custom";

/// Largest quantity a single cart line may order.
pub const MAX_QUANTITY: u32 = 1_000;

/// Largest number of physical units a cart may expand to.
pub const MAX_EXPANDED_ITEMS: usize = 10_000;

/// Validation error for cart and catalog data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// A cart line: one product definition and how many units are ordered.
///
/// Dimensions are in inches, weight in ounces per unit.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "mug-12oz",
    "length": 6.0,
    "width": 5.0,
    "height": 3.0,
    "weight": 100.0,
    "quantity": 2
}))]
pub struct CartLine {
    pub id: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub weight: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl CartLine {
    /// Creates a cart line with validation.
    ///
    /// # Examples
    /// ```
    /// use usps_box_packer::model::CartLine;
    ///
    /// assert!(CartLine::new("a", (8.0, 6.0, 4.0), 300.0, 1).is_ok());
    /// assert!(CartLine::new("b", (8.0, 0.0, 4.0), 300.0, 1).is_err());
    /// assert!(CartLine::new("c", (8.0, 6.0, 4.0), 300.0, 0).is_err());
    /// ```
    pub fn new(
        id: impl Into<String>,
        dims: (f64, f64, f64),
        weight: f64,
        quantity: u32,
    ) -> Result<Self, ValidationError> {
        let line = Self {
            id: id.into(),
            length: dims.0,
            width: dims.1,
            height: dims.2,
            weight,
            quantity,
        };
        line.validate()?;
        Ok(line)
    }

    /// Checks the positive-dimension, positive-weight and quantity invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_dims(&self.dimensions(), &format!("Item '{}'", self.id))?;
        validation::validate_weight(self.weight, &format!("Item '{}' weight", self.id))?;
        if self.quantity == 0 {
            return Err(ValidationError::InvalidQuantity(format!(
                "Item '{}' quantity must be at least 1",
                self.id
            )));
        }
        if self.quantity > MAX_QUANTITY {
            return Err(ValidationError::InvalidQuantity(format!(
                "Item '{}' quantity {} exceeds the limit of {}",
                self.id, self.quantity, MAX_QUANTITY
            )));
        }
        Ok(())
    }

    /// Weight of the whole line (unit weight × quantity).
    pub fn line_weight(&self) -> f64 {
        self.weight * f64::from(self.quantity)
    }

    /// Volume of the whole line (unit volume × quantity).
    pub fn line_volume(&self) -> f64 {
        self.dimensions().volume() * f64::from(self.quantity)
    }
}

impl Dimensional for CartLine {
    fn dimensions(&self) -> Dims {
        Dims::new(self.length, self.width, self.height)
    }
}

/// A single physical unit to ship.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Item {
    pub id: String,
    pub dims: Dims,
    /// Weight in ounces.
    pub weight: f64,
    /// Cached `length × width × height`.
    pub volume: f64,
}

impl Item {
    /// Creates a new item with validation. The volume is computed once here.
    pub fn new(id: impl Into<String>, dims: Dims, weight: f64) -> Result<Self, ValidationError> {
        let id = id.into();
        validation::validate_dims(&dims, &format!("Item '{id}'"))?;
        validation::validate_weight(weight, &format!("Item '{id}' weight"))?;
        Ok(Self {
            id,
            volume: dims.volume(),
            dims,
            weight,
        })
    }
}

impl Dimensional for Item {
    fn dimensions(&self) -> Dims {
        self.dims
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

impl Weighted for Item {
    fn weight_oz(&self) -> f64 {
        self.weight
    }
}

/// Flattens a cart into one `Item` per physical unit.
///
/// Lines are validated first; a malformed line rejects the whole cart instead
/// of being coerced. Items keep cart order, units of a line stay adjacent.
/// Carts expanding to more than [`MAX_EXPANDED_ITEMS`] units are rejected
/// before anything is allocated for them.
///
/// # Examples
/// ```
/// use usps_box_packer::model::{CartLine, expand_cart};
///
/// let cart = vec![CartLine::new("mug", (6.0, 5.0, 3.0), 100.0, 3).unwrap()];
/// let items = expand_cart(&cart).unwrap();
/// assert_eq!(items.len(), 3);
/// assert_eq!(items[0].volume, 90.0);
/// ```
pub fn expand_cart(lines: &[CartLine]) -> Result<Vec<Item>, ValidationError> {
    let mut total: usize = 0;
    for line in lines {
        line.validate()?;
        total = total.saturating_add(line.quantity as usize);
        if total > MAX_EXPANDED_ITEMS {
            return Err(ValidationError::InvalidQuantity(format!(
                "cart expands to more than {MAX_EXPANDED_ITEMS} items"
            )));
        }
    }

    let mut items = Vec::with_capacity(total);
    for line in lines {
        for _ in 0..line.quantity {
            items.push(Item::new(line.id.clone(), line.dimensions(), line.weight)?);
        }
    }
    Ok(items)
}

/// Packaging material of a box. Reporting only; the packer ignores it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BoxKind {
    Soft,
    #[default]
    Rigid,
}

/// A candidate shipping box from the merchant's inventory.
///
/// Dimensions are interior usable inches; weights are ounces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "Small box",
    "length": 8.0,
    "width": 6.0,
    "height": 4.0,
    "max_weight": 320.0,
    "tare_weight": 3.0,
    "kind": "rigid"
}))]
pub struct BoxDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub max_weight: f64,
    #[serde(default)]
    pub tare_weight: f64,
    #[serde(default)]
    pub kind: BoxKind,
}

impl BoxDefinition {
    /// Creates a new box definition after validating the parameters.
    pub fn new(
        name: Option<String>,
        dims: (f64, f64, f64),
        max_weight: f64,
        tare_weight: f64,
        kind: BoxKind,
    ) -> Result<Self, ValidationError> {
        let definition = Self {
            name,
            length: dims.0,
            width: dims.1,
            height: dims.2,
            max_weight,
            tare_weight,
            kind,
        };
        definition.validate()?;
        Ok(definition)
    }

    /// Checks dimensions, capacity and tare.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_dims(&self.dimensions(), "Box")?;
        validation::validate_weight(self.max_weight, "Box max weight")?;
        validation::validate_non_negative_weight(self.tare_weight, "Box tare weight")?;
        Ok(())
    }
}

impl Dimensional for BoxDefinition {
    fn dimensions(&self) -> Dims {
        Dims::new(self.length, self.width, self.height)
    }
}

/// Validated, non-empty snapshot of the box inventory.
///
/// Keys are opaque identifiers reported back on each package. The map is
/// ordered so that equal-volume boxes are always tried in key order.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct BoxInventory {
    boxes: BTreeMap<String, BoxDefinition>,
}

impl BoxInventory {
    /// Validates every definition and rejects an empty inventory.
    pub fn new(boxes: BTreeMap<String, BoxDefinition>) -> Result<Self, ValidationError> {
        if boxes.is_empty() {
            return Err(ValidationError::InvalidConfiguration(
                "box inventory must contain at least one box".to_string(),
            ));
        }
        for (key, definition) in &boxes {
            definition.validate().map_err(|err| {
                ValidationError::InvalidConfiguration(format!("box '{key}': {err}"))
            })?;
        }
        Ok(Self { boxes })
    }

    /// Wraps built-in definitions that are known to be valid.
    pub(crate) fn from_trusted(boxes: BTreeMap<String, BoxDefinition>) -> Self {
        debug_assert!(!boxes.is_empty());
        Self { boxes }
    }

    /// Builds an inventory from `(key, definition)` pairs.
    pub fn from_entries<K: Into<String>>(
        entries: impl IntoIterator<Item = (K, BoxDefinition)>,
    ) -> Result<Self, ValidationError> {
        Self::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Looks up a box by key.
    pub fn get(&self, key: &str) -> Option<&BoxDefinition> {
        self.boxes.get(key)
    }

    /// Number of box definitions.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Always `false` for a constructed inventory; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Iterates boxes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoxDefinition)> {
        self.boxes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Boxes sorted by interior volume ascending; equal volumes keep key order.
    pub fn by_volume(&self) -> Vec<(&str, &BoxDefinition)> {
        let mut sorted: Vec<_> = self.iter().collect();
        sorted.sort_by(|a, b| a.1.volume().total_cmp(&b.1.volume()));
        sorted
    }
}

/// Working accumulator for one box during the packing pass.
///
/// Every accepted item produces a new value via [`PackedBox::with_item`];
/// the running totals are never patched in place from outside.
#[derive(Clone, Debug, PartialEq)]
pub struct PackedBox {
    pub(crate) box_type: String,
    pub(crate) definition: BoxDefinition,
    pub(crate) items: Vec<Item>,
    pub(crate) current_weight: f64,
    pub(crate) used_volume: f64,
    pub(crate) stacked_height: f64,
    pub(crate) is_oversized: bool,
}

impl PackedBox {
    /// Opens an inventory box holding its first item.
    pub fn open(box_type: impl Into<String>, definition: BoxDefinition, first: Item) -> Self {
        Self {
            box_type: box_type.into(),
            definition,
            items: Vec::new(),
            current_weight: 0.0,
            used_volume: 0.0,
            stacked_height: 0.0,
            is_oversized: false,
        }
        .with_item(first)
    }

    /// Wraps a single item that fits no inventory box in a custom package.
    ///
    /// The package is the item padded by `padding` inches on each axis, with
    /// an estimated packaging tare of `tare_weight` ounces.
    pub fn oversized(item: Item, padding: f64, tare_weight: f64) -> Self {
        let dims = item.dims.padded(padding);
        let definition = BoxDefinition {
            name: Some("Custom oversized package".to_string()),
            length: dims.length,
            width: dims.width,
            height: dims.height,
            max_weight: item.weight,
            tare_weight,
            kind: BoxKind::Rigid,
        };
        Self {
            box_type: CUSTOM_BOX_TYPE.to_string(),
            definition,
            items: Vec::new(),
            current_weight: 0.0,
            used_volume: 0.0,
            stacked_height: 0.0,
            is_oversized: true,
        }
        .with_item(item)
    }

    /// Returns the box with `item` appended and all running totals updated.
    ///
    /// The stack grows by the item's shortest edge regardless of which edge
    /// passed the height check.
    pub fn with_item(self, item: Item) -> Self {
        let Self {
            box_type,
            definition,
            mut items,
            current_weight,
            used_volume,
            stacked_height,
            is_oversized,
        } = self;
        let current_weight = current_weight + item.weight;
        let used_volume = used_volume + item.volume;
        let stacked_height = stacked_height + item.dims.min_edge();
        items.push(item);
        Self {
            box_type,
            definition,
            items,
            current_weight,
            used_volume,
            stacked_height,
            is_oversized,
        }
    }

    pub fn box_type(&self) -> &str {
        &self.box_type
    }

    pub fn definition(&self) -> &BoxDefinition {
        &self.definition
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn current_weight(&self) -> f64 {
        self.current_weight
    }

    pub fn used_volume(&self) -> f64 {
        self.used_volume
    }

    pub fn stacked_height(&self) -> f64 {
        self.stacked_height
    }

    pub fn is_oversized(&self) -> bool {
        self.is_oversized
    }
}

/// A finalized package, ready for rating and label printing.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Package {
    pub box_type: String,
    pub name: Option<String>,
    pub dims: Dims,
    pub items: Vec<Item>,
    /// Sum of contained item weights, without tare.
    pub contents_weight_oz: f64,
    /// Shipping weight: contents plus tare, rounded up to a whole ounce.
    pub weight_oz: f64,
    pub max_weight: f64,
    pub used_volume: f64,
    pub is_oversized: bool,
}

impl Package {
    /// Number of items in the package.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Shipping weight in pounds, rounded to two decimals.
    pub fn weight_lbs(&self) -> f64 {
        round2(self.weight_oz / OUNCES_PER_POUND)
    }

    /// Share of the box volume occupied by items, in percent.
    pub fn utilization_percent(&self) -> f64 {
        let total = self.dims.volume();
        if total <= 0.0 {
            return 0.0;
        }
        (self.used_volume / total) * 100.0
    }
}

impl Dimensional for Package {
    fn dimensions(&self) -> Dims {
        self.dims
    }
}

impl Weighted for Package {
    fn weight_oz(&self) -> f64 {
        self.weight_oz
    }
}
