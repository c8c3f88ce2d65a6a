//! Flat-rate box matching and rate comparison.
//!
//! Given the cart and a calculated (weight/zone based) rate, finds the
//! cheapest USPS flat-rate box that roughly holds the whole load and decides,
//! per the merchant's policy, whether to offer it instead. The comparison never
//! fails: every dead end resolves to "use the calculated rate".

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tracing::debug;
use utoipa::ToSchema;

use crate::model::{CartLine, ValidationError};
use crate::types::{Dimensional, Dims, validation};

/// USPS maximum weight for any flat-rate piece: 70 lb.
pub const FLAT_RATE_MAX_WEIGHT_OZ: f64 = 1120.0;

/// Price list the merchant ships under.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PricingTier {
    #[default]
    Retail,
    Commercial,
    Business,
}

impl FromStr for PricingTier {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "retail" => Ok(Self::Retail),
            "commercial" => Ok(Self::Commercial),
            "business" => Ok(Self::Business),
            other => Err(ValidationError::InvalidConfiguration(format!(
                "unknown pricing tier '{other}' (expected retail, commercial or business)"
            ))),
        }
    }
}

/// When to substitute a flat-rate box for the calculated rate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FlatRatePolicy {
    Always,
    Never,
    #[default]
    Cheaper,
}

impl FromStr for FlatRatePolicy {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            "cheaper" => Ok(Self::Cheaper),
            other => Err(ValidationError::InvalidConfiguration(format!(
                "unknown flat-rate policy '{other}' (expected always, never or cheaper)"
            ))),
        }
    }
}

/// Prices of one flat-rate box for each tier, in dollars.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FlatRatePrices {
    pub retail: f64,
    pub commercial: f64,
    pub business: f64,
}

impl FlatRatePrices {
    pub const fn new(retail: f64, commercial: f64, business: f64) -> Self {
        Self {
            retail,
            commercial,
            business,
        }
    }

    /// Price for the given tier.
    pub fn for_tier(&self, tier: PricingTier) -> f64 {
        match tier {
            PricingTier::Retail => self.retail,
            PricingTier::Commercial => self.commercial,
            PricingTier::Business => self.business,
        }
    }
}

/// A fixed-price USPS box or envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "Priority Mail Small Flat Rate Box",
    "length": 8.625,
    "width": 5.375,
    "height": 1.625,
    "max_weight_oz": 1120.0,
    "zone_based": false,
    "prices": { "retail": 10.40, "commercial": 9.45, "business": 9.20 }
}))]
pub struct FlatRateBox {
    pub name: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub max_weight_oz: f64,
    /// Regional-rate boxes are priced by zone and never used for comparison.
    #[serde(default)]
    pub zone_based: bool,
    pub prices: FlatRatePrices,
}

impl FlatRateBox {
    fn new(
        name: &str,
        dims: (f64, f64, f64),
        max_weight_oz: f64,
        zone_based: bool,
        prices: FlatRatePrices,
    ) -> Self {
        Self {
            name: name.to_string(),
            length: dims.0,
            width: dims.1,
            height: dims.2,
            max_weight_oz,
            zone_based,
            prices,
        }
    }

    /// Checks dimensions, weight limit and prices.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_dims(&self.dimensions(), &self.name)?;
        validation::validate_weight(self.max_weight_oz, &format!("{} max weight", self.name))?;
        for price in [self.prices.retail, self.prices.commercial, self.prices.business] {
            if !price.is_finite() || price < 0.0 {
                return Err(ValidationError::InvalidConfiguration(format!(
                    "{} has an invalid price: {price}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

impl Dimensional for FlatRateBox {
    fn dimensions(&self) -> Dims {
        Dims::new(self.length, self.width, self.height)
    }
}

/// Keyed, ordered snapshot of the flat-rate catalog.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct FlatRateCatalog {
    boxes: BTreeMap<String, FlatRateBox>,
}

impl FlatRateCatalog {
    /// Validates every entry. An empty catalog is allowed and simply never
    /// offers a flat rate.
    pub fn new(boxes: BTreeMap<String, FlatRateBox>) -> Result<Self, ValidationError> {
        for (key, flat_box) in &boxes {
            flat_box.validate().map_err(|err| {
                ValidationError::InvalidConfiguration(format!("flat-rate box '{key}': {err}"))
            })?;
        }
        Ok(Self { boxes })
    }

    /// The standard USPS Priority Mail flat-rate and regional-rate pieces.
    ///
    /// Interior dimensions in inches, prices in dollars.
    pub fn usps_default() -> Self {
        let entries = [
            (
                "flat_rate_envelope",
                FlatRateBox::new(
                    "Priority Mail Flat Rate Envelope",
                    (12.5, 9.5, 0.5),
                    FLAT_RATE_MAX_WEIGHT_OZ,
                    false,
                    FlatRatePrices::new(9.85, 8.55, 8.30),
                ),
            ),
            (
                "legal_flat_rate_envelope",
                FlatRateBox::new(
                    "Priority Mail Legal Flat Rate Envelope",
                    (15.0, 9.5, 0.5),
                    FLAT_RATE_MAX_WEIGHT_OZ,
                    false,
                    FlatRatePrices::new(10.15, 8.85, 8.60),
                ),
            ),
            (
                "padded_flat_rate_envelope",
                FlatRateBox::new(
                    "Priority Mail Padded Flat Rate Envelope",
                    (12.5, 9.5, 1.0),
                    FLAT_RATE_MAX_WEIGHT_OZ,
                    false,
                    FlatRatePrices::new(10.40, 9.20, 8.95),
                ),
            ),
            (
                "small_flat_rate_box",
                FlatRateBox::new(
                    "Priority Mail Small Flat Rate Box",
                    (8.625, 5.375, 1.625),
                    FLAT_RATE_MAX_WEIGHT_OZ,
                    false,
                    FlatRatePrices::new(10.40, 9.45, 9.20),
                ),
            ),
            (
                "medium_flat_rate_box_1",
                FlatRateBox::new(
                    "Priority Mail Medium Flat Rate Box (top loading)",
                    (11.0, 8.5, 5.5),
                    FLAT_RATE_MAX_WEIGHT_OZ,
                    false,
                    FlatRatePrices::new(18.40, 16.10, 15.60),
                ),
            ),
            (
                "medium_flat_rate_box_2",
                FlatRateBox::new(
                    "Priority Mail Medium Flat Rate Box (side loading)",
                    (13.625, 11.875, 3.375),
                    FLAT_RATE_MAX_WEIGHT_OZ,
                    false,
                    FlatRatePrices::new(18.40, 16.10, 15.60),
                ),
            ),
            (
                "large_flat_rate_box",
                FlatRateBox::new(
                    "Priority Mail Large Flat Rate Box",
                    (12.0, 12.0, 5.5),
                    FLAT_RATE_MAX_WEIGHT_OZ,
                    false,
                    FlatRatePrices::new(24.75, 22.45, 21.90),
                ),
            ),
            (
                "regional_rate_box_a",
                FlatRateBox::new(
                    "Priority Mail Regional Rate Box A",
                    (10.125, 7.125, 5.0),
                    240.0,
                    true,
                    FlatRatePrices::new(10.10, 9.05, 9.05),
                ),
            ),
            (
                "regional_rate_box_b",
                FlatRateBox::new(
                    "Priority Mail Regional Rate Box B",
                    (12.25, 10.5, 5.5),
                    320.0,
                    true,
                    FlatRatePrices::new(16.70, 13.80, 13.80),
                ),
            ),
        ];
        Self {
            boxes: entries
                .into_iter()
                .map(|(key, flat_box)| (key.to_string(), flat_box))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FlatRateBox> {
        self.boxes.get(key)
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlatRateBox)> {
        self.boxes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Non-zone-based boxes sorted by price for `tier`; equal prices keep key
    /// order.
    pub fn candidates(&self, tier: PricingTier) -> Vec<(&str, &FlatRateBox)> {
        let mut candidates: Vec<_> = self.iter().filter(|(_, b)| !b.zone_based).collect();
        candidates.sort_by(|a, b| {
            a.1.prices
                .for_tier(tier)
                .total_cmp(&b.1.prices.for_tier(tier))
        });
        candidates
    }
}

/// Merchant settings that drive the comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FlatRateSettings {
    pub tier: PricingTier,
    /// Dollars added to any flat-rate price.
    #[serde(default)]
    pub markup: f64,
    pub policy: FlatRatePolicy,
}

impl FlatRateSettings {
    /// A markup must be a finite, non-negative dollar amount.
    pub fn is_valid_markup(markup: f64) -> bool {
        markup.is_finite() && markup >= 0.0
    }
}

/// Aggregate dimensions of a whole cart.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct CartAggregate {
    pub total_weight_oz: f64,
    /// Per-axis maxima, taken independently across lines.
    pub max_dims: Dims,
    pub total_volume: f64,
}

/// Sums weight and volume (quantity-multiplied) and takes the per-axis maxima.
pub fn aggregate_cart(lines: &[CartLine]) -> CartAggregate {
    lines.iter().fold(
        CartAggregate {
            total_weight_oz: 0.0,
            max_dims: Dims::new(0.0, 0.0, 0.0),
            total_volume: 0.0,
        },
        |acc, line| CartAggregate {
            total_weight_oz: acc.total_weight_oz + line.line_weight(),
            max_dims: Dims::new(
                acc.max_dims.length.max(line.length),
                acc.max_dims.width.max(line.width),
                acc.max_dims.height.max(line.height),
            ),
            total_volume: acc.total_volume + line.line_volume(),
        },
    )
}

/// A flat-rate box that can carry the cart, with its effective price.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct FlatRateChoice {
    pub key: String,
    pub name: String,
    /// Tier price plus markup, never below zero.
    pub price: f64,
}

/// Why the comparison ended the way it did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    EmptyCart,
    ExceedsWeightLimit,
    NoFittingBox,
    PolicyAlways,
    PolicyNever,
    FlatRateCheaper,
    CalculatedNotMoreExpensive,
}

impl DecisionReason {
    pub fn code(&self) -> &'static str {
        match self {
            DecisionReason::EmptyCart => "empty_cart",
            DecisionReason::ExceedsWeightLimit => "exceeds_weight_limit",
            DecisionReason::NoFittingBox => "no_fitting_box",
            DecisionReason::PolicyAlways => "policy_always",
            DecisionReason::PolicyNever => "policy_never",
            DecisionReason::FlatRateCheaper => "flat_rate_cheaper",
            DecisionReason::CalculatedNotMoreExpensive => "calculated_not_more_expensive",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::EmptyCart => write!(f, "Cart is empty; nothing to ship flat rate"),
            DecisionReason::ExceedsWeightLimit => {
                write!(f, "Shipment exceeds the 70 lb flat-rate weight limit")
            }
            DecisionReason::NoFittingBox => write!(f, "No flat-rate box fits the shipment"),
            DecisionReason::PolicyAlways => write!(f, "Flat rate is always used when available"),
            DecisionReason::PolicyNever => write!(f, "Flat rate is disabled by policy"),
            DecisionReason::FlatRateCheaper => write!(f, "Flat rate is cheaper"),
            DecisionReason::CalculatedNotMoreExpensive => {
                write!(f, "Calculated rate is cheaper or equal")
            }
        }
    }
}

/// Outcome of comparing flat-rate boxes against the calculated rate.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct FlatRateDecision {
    pub use_flat_rate: bool,
    /// The rate to charge: flat-rate price or the calculated rate.
    pub rate: f64,
    /// Cheapest fitting flat-rate box, if any, even when it is not used.
    pub flat_rate_box: Option<FlatRateChoice>,
    pub reason: DecisionReason,
}

impl FlatRateDecision {
    fn calculated(rate: f64, flat_rate_box: Option<FlatRateChoice>, reason: DecisionReason) -> Self {
        Self {
            use_flat_rate: false,
            rate,
            flat_rate_box,
            reason,
        }
    }
}

/// Finds the cheapest flat-rate box for the cart aggregate.
///
/// The fit check is deliberately loose: sorted box edges against the sorted
/// per-axis maxima, total volume against box volume, total weight against the
/// box limit.
pub fn find_flat_rate_box<'a>(
    aggregate: &CartAggregate,
    catalog: &'a FlatRateCatalog,
    tier: PricingTier,
) -> Option<(&'a str, &'a FlatRateBox)> {
    let needed = aggregate.max_dims.sorted_desc();
    catalog.candidates(tier).into_iter().find(|(_, flat_box)| {
        let available = flat_box.dimensions().sorted_desc();
        available.iter().zip(needed.iter()).all(|(have, need)| have >= need)
            && aggregate.total_volume <= flat_box.volume()
            && aggregate.total_weight_oz <= flat_box.max_weight_oz
    })
}

/// Decides between the calculated rate and the cheapest fitting flat-rate box.
///
/// # Parameters
/// * `calculated_rate` - Weight/zone based rate for the packed shipment
/// * `lines` - The cart (unexpanded, quantities applied here)
/// * `catalog` - Flat-rate catalog snapshot
/// * `settings` - Pricing tier, markup and policy
///
/// # Examples
/// ```
/// use usps_box_packer::flat_rate::{
///     compare_flat_rate_vs_calculated, FlatRateCatalog, FlatRateSettings,
/// };
/// use usps_box_packer::model::CartLine;
///
/// let cart = vec![CartLine::new("book", (8.0, 5.0, 1.5), 20.0, 1).unwrap()];
/// let decision = compare_flat_rate_vs_calculated(
///     14.00,
///     &cart,
///     &FlatRateCatalog::usps_default(),
///     &FlatRateSettings::default(),
/// );
/// assert!(decision.use_flat_rate);
/// assert_eq!(decision.rate, 10.40);
/// ```
pub fn compare_flat_rate_vs_calculated(
    calculated_rate: f64,
    lines: &[CartLine],
    catalog: &FlatRateCatalog,
    settings: &FlatRateSettings,
) -> FlatRateDecision {
    if lines.is_empty() {
        return FlatRateDecision::calculated(calculated_rate, None, DecisionReason::EmptyCart);
    }

    let aggregate = aggregate_cart(lines);
    if aggregate.total_weight_oz > FLAT_RATE_MAX_WEIGHT_OZ {
        debug!(
            total_weight_oz = aggregate.total_weight_oz,
            "shipment too heavy for flat rate"
        );
        return FlatRateDecision::calculated(
            calculated_rate,
            None,
            DecisionReason::ExceedsWeightLimit,
        );
    }

    let Some((key, flat_box)) = find_flat_rate_box(&aggregate, catalog, settings.tier) else {
        return FlatRateDecision::calculated(calculated_rate, None, DecisionReason::NoFittingBox);
    };

    let choice = FlatRateChoice {
        key: key.to_string(),
        name: flat_box.name.clone(),
        price: (flat_box.prices.for_tier(settings.tier) + settings.markup).max(0.0),
    };
    debug!(
        flat_rate_box = key,
        price = choice.price,
        calculated_rate,
        "flat-rate candidate found"
    );

    match settings.policy {
        FlatRatePolicy::Always => FlatRateDecision {
            use_flat_rate: true,
            rate: choice.price,
            flat_rate_box: Some(choice),
            reason: DecisionReason::PolicyAlways,
        },
        FlatRatePolicy::Never => FlatRateDecision::calculated(
            calculated_rate,
            Some(choice),
            DecisionReason::PolicyNever,
        ),
        FlatRatePolicy::Cheaper if choice.price < calculated_rate => FlatRateDecision {
            use_flat_rate: true,
            rate: choice.price,
            flat_rate_box: Some(choice),
            reason: DecisionReason::FlatRateCheaper,
        },
        FlatRatePolicy::Cheaper => FlatRateDecision::calculated(
            calculated_rate,
            Some(choice),
            DecisionReason::CalculatedNotMoreExpensive,
        ),
    }
}
