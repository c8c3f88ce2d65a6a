//! Packing logic: assigns cart items to shipping boxes.
//!
//! This module implements a first-fit-decreasing heuristic that respects:
//! - Box weight capacity
//! - Rotation-aware fit against the box's full interior
//! - A volume budget (packing efficiency)
//! - A one-dimensional stacking height budget
//!
//! It does not simulate true 3D placement: the height budget is a running sum
//! of each item's shortest edge. This keeps packing results, and therefore
//! shipping costs, identical to the established store behaviour.

use serde::Serialize;
use tracing::debug;

use crate::geometry::fits;
use crate::model::{BoxDefinition, BoxInventory, Item, Package, PackedBox};
use crate::types::{Dimensional, Dims, Weighted};

/// Configuration for the packing algorithm.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Share of a box's interior volume that may be filled (0.0 to 1.0)
    pub packing_efficiency: f64,
    /// Inches added to every edge of an oversized custom package
    pub oversize_padding: f64,
    /// Estimated packaging weight of an oversized custom package in ounces
    pub oversize_tare: f64,
}

impl PackingConfig {
    pub const DEFAULT_PACKING_EFFICIENCY: f64 = 0.8;
    pub const DEFAULT_OVERSIZE_PADDING: f64 = 2.0;
    pub const DEFAULT_OVERSIZE_TARE: f64 = 8.0;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            packing_efficiency: Self::DEFAULT_PACKING_EFFICIENCY,
            oversize_padding: Self::DEFAULT_OVERSIZE_PADDING,
            oversize_tare: Self::DEFAULT_OVERSIZE_TARE,
        }
    }
}

/// Builder for PackingConfig.
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    /// Sets the usable share of box volume.
    pub fn packing_efficiency(mut self, efficiency: f64) -> Self {
        self.config.packing_efficiency = efficiency;
        self
    }

    /// Sets the per-edge padding of oversized packages.
    pub fn oversize_padding(mut self, padding: f64) -> Self {
        self.config.oversize_padding = padding;
        self
    }

    /// Sets the tare estimate of oversized packages.
    pub fn oversize_tare(mut self, tare: f64) -> Self {
        self.config.oversize_tare = tare;
        self
    }

    /// Builds the final configuration.
    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// Result of a packing run.
#[derive(Clone, Debug, PartialEq)]
pub struct PackingResult {
    pub packages: Vec<Package>,
}

impl PackingResult {
    /// Number of packages to ship.
    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Number of custom packages created for items no box could hold.
    pub fn oversized_count(&self) -> usize {
        self.packages.iter().filter(|p| p.is_oversized).count()
    }

    /// Number of items across all packages.
    pub fn item_count(&self) -> usize {
        self.packages.iter().map(Package::item_count).sum()
    }

    /// Sum of the finalized (tare-inclusive, rounded) package weights.
    pub fn total_weight_oz(&self) -> f64 {
        self.packages.iter().map(Weighted::weight_oz).sum()
    }
}

/// Events emitted while packing, for live progress streaming.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum PackEvent {
    /// An inventory box was opened for an item no open box accepted.
    BoxOpened {
        box_index: usize,
        box_type: String,
        dims: Dims,
        max_weight: f64,
    },
    /// An item was placed into a box.
    ItemPlaced {
        box_index: usize,
        item_id: String,
        weight: f64,
        volume: f64,
        current_weight: f64,
    },
    /// An item fit no inventory box and got its own custom package.
    OversizedCreated {
        box_index: usize,
        item_id: String,
        dims: Dims,
        weight: f64,
    },
    /// Packing finished.
    Finished { packages: usize, oversized: usize },
}

/// Packs items into boxes from the inventory with the default configuration.
///
/// # Parameters
/// * `items` - Expanded items, one per physical unit
/// * `inventory` - Snapshot of the available boxes
///
/// # Examples
/// ```
/// use usps_box_packer::model::{BoxDefinition, BoxInventory, BoxKind, Item};
/// use usps_box_packer::optimizer::pack_items;
/// use usps_box_packer::types::Dims;
///
/// let small = BoxDefinition::new(None, (8.0, 6.0, 4.0), 320.0, 0.0, BoxKind::Rigid).unwrap();
/// let inventory = BoxInventory::from_entries([("box_small", small)]).unwrap();
/// let items = vec![Item::new("a", Dims::new(8.0, 6.0, 4.0), 300.0).unwrap()];
///
/// let result = pack_items(items, &inventory);
/// assert_eq!(result.package_count(), 1);
/// assert_eq!(result.packages[0].box_type, "box_small");
/// ```
pub fn pack_items(items: Vec<Item>, inventory: &BoxInventory) -> PackingResult {
    pack_items_with_config(items, inventory, PackingConfig::default())
}

/// Like `pack_items`, with adjustable parameters.
pub fn pack_items_with_config(
    items: Vec<Item>,
    inventory: &BoxInventory,
    config: PackingConfig,
) -> PackingResult {
    pack_items_with_progress(items, inventory, config, |_| {})
}

/// Packing with a progress callback invoked for every step.
///
/// Items are sorted by volume, largest first. `sort_by` is stable, so items of
/// equal volume keep their expansion order. Each item goes into the first open
/// box (in opening order) that accepts it, else into the smallest new box that
/// can hold it, else into an oversized custom package.
pub fn pack_items_with_progress(
    items: Vec<Item>,
    inventory: &BoxInventory,
    config: PackingConfig,
    mut on_event: impl FnMut(&PackEvent),
) -> PackingResult {
    let mut items = items;
    items.sort_by(|a, b| b.volume.total_cmp(&a.volume));

    let candidates = inventory.by_volume();
    // Every box in opening order. Custom packages stay in this list for
    // reporting but are never offered to later items.
    let mut boxes: Vec<PackedBox> = Vec::new();

    for item in items {
        let open_slot = boxes
            .iter()
            .position(|packed| !packed.is_oversized() && can_add(&item, packed, &config));

        if let Some(idx) = open_slot {
            let updated = boxes.remove(idx).with_item(item);
            if let Some(placed) = updated.items().last() {
                debug!(
                    item = %placed.id,
                    box_type = updated.box_type(),
                    current_weight = updated.current_weight(),
                    "item added to open box"
                );
                on_event(&PackEvent::ItemPlaced {
                    box_index: idx + 1,
                    item_id: placed.id.clone(),
                    weight: placed.weight,
                    volume: placed.volume,
                    current_weight: updated.current_weight(),
                });
            }
            boxes.insert(idx, updated);
            continue;
        }

        let box_index = boxes.len() + 1;
        let packed = match smallest_fitting_box(&item, &candidates) {
            Some((key, definition)) => {
                debug!(box_type = key, box_index, "opened new box");
                on_event(&PackEvent::BoxOpened {
                    box_index,
                    box_type: key.to_string(),
                    dims: definition.dimensions(),
                    max_weight: definition.max_weight,
                });
                let packed = PackedBox::open(key, definition.clone(), item);
                if let Some(placed) = packed.items().last() {
                    on_event(&PackEvent::ItemPlaced {
                        box_index,
                        item_id: placed.id.clone(),
                        weight: placed.weight,
                        volume: placed.volume,
                        current_weight: packed.current_weight(),
                    });
                }
                packed
            }
            None => {
                let packed =
                    PackedBox::oversized(item, config.oversize_padding, config.oversize_tare);
                if let Some(placed) = packed.items().first() {
                    debug!(item = %placed.id, box_index, "item fits no inventory box");
                    on_event(&PackEvent::OversizedCreated {
                        box_index,
                        item_id: placed.id.clone(),
                        dims: packed.definition().dimensions(),
                        weight: packed.current_weight(),
                    });
                }
                packed
            }
        };
        boxes.push(packed);
    }

    let result = PackingResult {
        packages: boxes.into_iter().map(finalize).collect(),
    };
    on_event(&PackEvent::Finished {
        packages: result.package_count(),
        oversized: result.oversized_count(),
    });
    result
}

/// Decides whether `item` may join the already-open `packed` box.
///
/// All four gates must pass:
/// - weight: contents plus the item stay within `max_weight` (tare excluded)
/// - fit: the item fits the box's full interior in some orientation
/// - volume: contents plus the item stay within `efficiency × box volume`
/// - height: the stack plus the item's height stays within the box height,
///   or, failing that, the stack plus the item's shortest edge does
pub fn can_add(item: &Item, packed: &PackedBox, config: &PackingConfig) -> bool {
    let definition = packed.definition();
    let box_dims = definition.dimensions();

    if packed.current_weight() + item.weight_oz() > definition.max_weight {
        return false;
    }

    if fits(&item.dims, &box_dims).is_none() {
        return false;
    }

    if box_dims.volume() * config.packing_efficiency < packed.used_volume() + item.volume {
        return false;
    }

    packed.stacked_height() + item.dims.height <= box_dims.height
        || packed.stacked_height() + item.dims.min_edge() <= box_dims.height
}

/// Finds the smallest inventory box that can hold `item` on its own.
///
/// `candidates` must be sorted by volume ascending; the first box that fits
/// geometrically and whose capacity covers the item's weight wins.
fn smallest_fitting_box<'a>(
    item: &Item,
    candidates: &[(&'a str, &'a BoxDefinition)],
) -> Option<(&'a str, &'a BoxDefinition)> {
    candidates
        .iter()
        .copied()
        .find(|(_, definition)| {
            definition.max_weight >= item.weight
                && fits(&item.dims, &definition.dimensions()).is_some()
        })
}

/// Finalizes a box into a package.
///
/// Shipping weight is contents plus tare, rounded up to the next whole ounce.
/// Dimensions stay the box's declared dimensions (padded item dimensions for
/// custom packages); they are never shrunk to the contents.
pub fn finalize(packed: PackedBox) -> Package {
    let PackedBox {
        box_type,
        definition,
        items,
        current_weight,
        used_volume,
        is_oversized,
        ..
    } = packed;

    Package {
        box_type,
        dims: definition.dimensions(),
        weight_oz: (current_weight + definition.tare_weight).ceil(),
        contents_weight_oz: current_weight,
        max_weight: definition.max_weight,
        name: definition.name,
        items,
        used_volume,
        is_oversized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoxKind, CUSTOM_BOX_TYPE};

    fn item(id: &str, dims: (f64, f64, f64), weight: f64) -> Item {
        Item::new(id, dims.into(), weight).unwrap()
    }

    fn rigid(dims: (f64, f64, f64), max_weight: f64, tare: f64) -> BoxDefinition {
        BoxDefinition::new(None, dims, max_weight, tare, BoxKind::Rigid).unwrap()
    }

    fn scenario_inventory() -> BoxInventory {
        BoxInventory::from_entries([
            ("box_small", rigid((8.0, 6.0, 4.0), 320.0, 0.0)),
            ("box_medium", rigid((12.0, 10.0, 8.0), 480.0, 0.0)),
        ])
        .unwrap()
    }

    #[test]
    fn heavy_pair_opens_two_small_boxes() {
        let items = vec![
            item("A", (8.0, 6.0, 4.0), 300.0),
            item("B", (6.0, 5.0, 3.0), 100.0),
        ];

        let result = pack_items(items, &scenario_inventory());

        assert_eq!(result.package_count(), 2);
        for package in &result.packages {
            assert_eq!(package.box_type, "box_small");
            assert_eq!(package.item_count(), 1);
        }
        assert_eq!(result.packages[0].items[0].id, "A");
        assert_eq!(result.packages[1].items[0].id, "B");
    }

    #[test]
    fn light_items_share_an_open_box() {
        let inventory = BoxInventory::from_entries([(
            "box_medium",
            rigid((12.0, 10.0, 8.0), 480.0, 0.0),
        )])
        .unwrap();
        let items = vec![
            item("A", (8.0, 6.0, 4.0), 100.0),
            item("B", (6.0, 5.0, 3.0), 100.0),
        ];

        let result = pack_items(items, &inventory);
        assert_eq!(result.package_count(), 1);
        assert_eq!(result.packages[0].item_count(), 2);
        assert_eq!(result.packages[0].contents_weight_oz, 200.0);
    }

    #[test]
    fn volume_budget_rejects_second_item() {
        // 2 × 200 in³ exceeds 0.8 × 480 in³ = 384 in³.
        let inventory =
            BoxInventory::from_entries([("cube", rigid((8.0, 6.0, 10.0), 1000.0, 0.0))]).unwrap();
        let items = vec![
            item("A", (5.0, 5.0, 8.0), 10.0),
            item("B", (5.0, 5.0, 8.0), 10.0),
        ];

        let result = pack_items(items, &inventory);
        assert_eq!(result.package_count(), 2);
    }

    #[test]
    fn height_budget_retries_with_shortest_edge() {
        let mut config = PackingConfig::default();
        config.packing_efficiency = 1.0;
        let definition = rigid((10.0, 10.0, 6.0), 1000.0, 0.0);
        let first = PackedBox::open("tray", definition, item("base", (10.0, 10.0, 2.0), 10.0));

        // Height 5 overflows 2 + 5 > 6, but laid flat (shortest edge 1) it fits.
        let tall = item("tall", (4.0, 1.0, 5.0), 10.0);
        assert!(can_add(&tall, &first, &config));

        let flat_too_high = first.clone().with_item(item("slab", (10.0, 10.0, 3.0), 10.0));
        // Stack is now 5; shortest edge 2 would reach 7 > 6.
        let block = item("block", (4.0, 2.0, 3.0), 10.0);
        assert!(!can_add(&block, &flat_too_high, &config));
    }

    #[test]
    fn weight_gate_ignores_tare() {
        let config = PackingConfig::default();
        let definition = rigid((12.0, 12.0, 12.0), 100.0, 50.0);
        let packed = PackedBox::open("heavy_tare", definition, item("a", (2.0, 2.0, 2.0), 60.0));
        assert!(can_add(&item("b", (2.0, 2.0, 2.0), 40.0), &packed, &config));
        assert!(!can_add(&item("c", (2.0, 2.0, 2.0), 40.5), &packed, &config));
    }

    #[test]
    fn opens_smallest_box_that_fits_and_carries_item() {
        let inventory = BoxInventory::from_entries([
            ("tiny", rigid((4.0, 4.0, 4.0), 1000.0, 0.0)),
            ("weak_medium", rigid((10.0, 10.0, 10.0), 50.0, 0.0)),
            ("strong_large", rigid((20.0, 20.0, 20.0), 1000.0, 0.0)),
        ])
        .unwrap();

        let result = pack_items(vec![item("a", (9.0, 9.0, 9.0), 60.0)], &inventory);
        assert_eq!(result.packages[0].box_type, "strong_large");
    }

    #[test]
    fn oversized_items_get_one_custom_package_each() {
        let inventory = scenario_inventory();
        let items = vec![
            item("pole-1", (100.0, 3.0, 3.0), 200.0),
            item("pole-2", (100.0, 3.0, 3.0), 200.0),
            item("mug", (6.0, 5.0, 3.0), 100.0),
        ];

        let result = pack_items(items, &inventory);

        assert_eq!(result.oversized_count(), 2);
        assert_eq!(result.package_count(), 3);
        for package in result.packages.iter().filter(|p| p.is_oversized) {
            assert_eq!(package.box_type, CUSTOM_BOX_TYPE);
            assert_eq!(package.item_count(), 1);
            assert_eq!(package.dims, Dims::new(102.0, 5.0, 5.0));
            assert_eq!(package.weight_oz, 208.0);
        }
    }

    #[test]
    fn too_heavy_for_every_box_becomes_oversized() {
        let result = pack_items(
            vec![item("anvil", (4.0, 4.0, 4.0), 2000.0)],
            &scenario_inventory(),
        );
        assert_eq!(result.oversized_count(), 1);
        assert_eq!(result.packages[0].dims, Dims::new(6.0, 6.0, 6.0));
    }

    #[test]
    fn finalize_adds_tare_and_rounds_up() {
        let packed = PackedBox::open(
            "box_small",
            rigid((8.0, 6.0, 4.0), 320.0, 2.5),
            item("a", (2.0, 2.0, 2.0), 10.2),
        );
        let package = finalize(packed);
        assert_eq!(package.weight_oz, 13.0);
        assert_eq!(package.contents_weight_oz, 10.2);
        assert_eq!(package.dims, Dims::new(8.0, 6.0, 4.0));
    }

    #[test]
    fn weight_is_conserved_and_capacity_respected() {
        let inventory = BoxInventory::from_entries([
            ("s", rigid((6.0, 6.0, 6.0), 64.0, 1.0)),
            ("m", rigid((10.0, 8.0, 6.0), 160.0, 2.0)),
            ("l", rigid((16.0, 12.0, 10.0), 480.0, 4.0)),
        ])
        .unwrap();
        let mut items = Vec::new();
        for n in 0..30 {
            let edge = 1.0 + (n % 7) as f64;
            items.push(item(
                &format!("i{n}"),
                (edge, 2.0 + (n % 3) as f64, 1.0 + (n % 4) as f64),
                5.0 + (n * 7 % 40) as f64,
            ));
        }
        items.push(item("huge", (40.0, 2.0, 2.0), 30.0));
        let input_weight: f64 = items.iter().map(|i| i.weight).sum();

        let result = pack_items(items, &inventory);

        let packed_weight: f64 = result
            .packages
            .iter()
            .flat_map(|p| p.items.iter())
            .map(|i| i.weight)
            .sum();
        assert!((packed_weight - input_weight).abs() < 1e-9);
        assert_eq!(result.item_count(), 31);
        for package in &result.packages {
            assert!(package.contents_weight_oz <= package.max_weight + 1e-9);
        }
    }

    #[test]
    fn packing_is_independent_of_input_order() {
        let inventory = BoxInventory::from_entries([
            ("s", rigid((6.0, 6.0, 6.0), 64.0, 1.0)),
            ("m", rigid((10.0, 8.0, 6.0), 160.0, 2.0)),
        ])
        .unwrap();
        let items: Vec<Item> = (1..=8)
            .map(|n| {
                let n = n as f64;
                item(&format!("i{n}"), (n, 1.0 + n / 10.0, 2.0), 4.0 * n)
            })
            .collect();
        let mut reversed = items.clone();
        reversed.reverse();

        let summary = |result: PackingResult| {
            let mut boxes: Vec<(String, u64)> = result
                .packages
                .into_iter()
                .map(|p| (p.box_type, p.weight_oz as u64))
                .collect();
            boxes.sort();
            boxes
        };

        assert_eq!(
            summary(pack_items(items, &inventory)),
            summary(pack_items(reversed, &inventory))
        );
    }

    #[test]
    fn equal_volume_items_keep_expansion_order() {
        let inventory =
            BoxInventory::from_entries([("m", rigid((12.0, 10.0, 8.0), 1000.0, 0.0))]).unwrap();
        let items = vec![
            item("first", (2.0, 3.0, 4.0), 1.0),
            item("second", (4.0, 3.0, 2.0), 1.0),
            item("third", (3.0, 4.0, 2.0), 1.0),
        ];
        let result = pack_items(items, &inventory);
        let ids: Vec<_> = result.packages[0].items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn progress_events_describe_the_run() {
        let mut events = Vec::new();
        let items = vec![
            item("A", (8.0, 6.0, 4.0), 300.0),
            item("B", (6.0, 5.0, 3.0), 100.0),
            item("pole", (100.0, 3.0, 3.0), 10.0),
        ];

        pack_items_with_progress(items, &scenario_inventory(), PackingConfig::default(), |e| {
            events.push(e.clone())
        });

        let opened = events
            .iter()
            .filter(|e| matches!(e, PackEvent::BoxOpened { .. }))
            .count();
        let oversized = events
            .iter()
            .filter(|e| matches!(e, PackEvent::OversizedCreated { .. }))
            .count();
        assert_eq!(opened, 2);
        assert_eq!(oversized, 1);
        assert!(matches!(
            events.last(),
            Some(PackEvent::Finished {
                packages: 3,
                oversized: 1
            })
        ));
    }

    #[test]
    fn empty_cart_yields_no_packages() {
        let result = pack_items(Vec::new(), &scenario_inventory());
        assert_eq!(result.package_count(), 0);
        assert_eq!(result.total_weight_oz(), 0.0);
    }
}
