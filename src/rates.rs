//! Shipment quoting over finalized packages.
//!
//! The carrier API client lives outside this crate; it plugs in through
//! [`RateSource`]. When it cannot price a package the quote degrades to a
//! dimensional-weight estimate so checkout always gets a usable number.

use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;

use crate::model::Package;
use crate::types::{Dimensional, OUNCES_PER_POUND, Weighted, round2};

/// Failure of an external rate lookup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    #[error("carrier rate unavailable: {0}")]
    Unavailable(String),
    #[error("package not serviceable: {0}")]
    NotServiceable(String),
}

/// Prices a single package for a destination.
pub trait RateSource {
    fn rate(&self, package: &Package, destination: &str) -> Result<f64, RateError>;
}

/// Estimate based on billable weight: the larger of actual weight and
/// dimensional weight (`L × W × H / divisor`), rounded up to whole pounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DimensionalWeightEstimator {
    pub base_rate: f64,
    pub per_pound_rate: f64,
    pub dim_divisor: f64,
}

impl DimensionalWeightEstimator {
    pub const DEFAULT_BASE_RATE: f64 = 8.00;
    pub const DEFAULT_PER_POUND_RATE: f64 = 1.25;
    pub const DEFAULT_DIM_DIVISOR: f64 = 166.0;

    /// Billable weight in whole pounds.
    pub fn billable_pounds(&self, package: &Package) -> f64 {
        let actual = package.weight_oz() / OUNCES_PER_POUND;
        let dimensional = package.volume() / self.dim_divisor;
        actual.max(dimensional).ceil().max(1.0)
    }

    /// Estimated price, rounded to cents.
    pub fn estimate(&self, package: &Package) -> f64 {
        round2(self.base_rate + self.per_pound_rate * self.billable_pounds(package))
    }
}

impl Default for DimensionalWeightEstimator {
    fn default() -> Self {
        Self {
            base_rate: Self::DEFAULT_BASE_RATE,
            per_pound_rate: Self::DEFAULT_PER_POUND_RATE,
            dim_divisor: Self::DEFAULT_DIM_DIVISOR,
        }
    }
}

impl RateSource for DimensionalWeightEstimator {
    fn rate(&self, package: &Package, _destination: &str) -> Result<f64, RateError> {
        Ok(self.estimate(package))
    }
}

/// Price of one package within a quote.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct PackageRate {
    pub box_type: String,
    pub rate: f64,
    /// `true` when the carrier failed and the estimate was used.
    pub estimated: bool,
}

/// Sum of package rates for a whole shipment.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ShipmentQuote {
    pub total: f64,
    pub packages: Vec<PackageRate>,
}

impl ShipmentQuote {
    /// Whether any package fell back to the estimate.
    pub fn has_estimates(&self) -> bool {
        self.packages.iter().any(|p| p.estimated)
    }
}

/// Prices every package and sums the result.
pub fn quote_shipment(
    packages: &[Package],
    destination: &str,
    source: &dyn RateSource,
    fallback: &DimensionalWeightEstimator,
) -> ShipmentQuote {
    let rates: Vec<PackageRate> = packages
        .iter()
        .map(|package| match source.rate(package, destination) {
            Ok(rate) => PackageRate {
                box_type: package.box_type.clone(),
                rate,
                estimated: false,
            },
            Err(err) => {
                warn!(box_type = %package.box_type, %err, "⚠️ falling back to estimated rate");
                PackageRate {
                    box_type: package.box_type.clone(),
                    rate: fallback.estimate(package),
                    estimated: true,
                }
            }
        })
        .collect();

    ShipmentQuote {
        total: round2(rates.iter().map(|r| r.rate).sum()),
        packages: rates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dims;

    fn package(box_type: &str, dims: (f64, f64, f64), weight_oz: f64) -> Package {
        Package {
            box_type: box_type.to_string(),
            name: None,
            dims: dims.into(),
            items: Vec::new(),
            contents_weight_oz: weight_oz,
            weight_oz,
            max_weight: weight_oz,
            used_volume: 0.0,
            is_oversized: false,
        }
    }

    struct FailsFor(&'static str);

    impl RateSource for FailsFor {
        fn rate(&self, package: &Package, _destination: &str) -> Result<f64, RateError> {
            if package.box_type == self.0 {
                Err(RateError::Unavailable("timeout".to_string()))
            } else {
                Ok(5.0)
            }
        }
    }

    #[test]
    fn billable_weight_uses_dimensional_weight_for_bulky_boxes() {
        let estimator = DimensionalWeightEstimator::default();
        // 24 × 18 × 18 / 166 = 46.8 lb dimensional vs 2 lb actual.
        let bulky = package("xl_box", (24.0, 18.0, 18.0), 32.0);
        assert_eq!(estimator.billable_pounds(&bulky), 47.0);

        let dense = package("small_box", (8.0, 6.0, 4.0), 300.0);
        assert_eq!(estimator.billable_pounds(&dense), 19.0);
    }

    #[test]
    fn billable_weight_is_at_least_one_pound() {
        let estimator = DimensionalWeightEstimator::default();
        let tiny = package("mailer", (4.0, 4.0, 1.0), 2.0);
        assert_eq!(estimator.billable_pounds(&tiny), 1.0);
        assert_eq!(estimator.estimate(&tiny), 9.25);
    }

    #[test]
    fn failed_packages_fall_back_to_estimate() {
        let packages = vec![
            package("small_box", (8.0, 6.0, 4.0), 16.0),
            package("custom", (102.0, 5.0, 5.0), 208.0),
        ];
        let fallback = DimensionalWeightEstimator::default();

        let quote = quote_shipment(&packages, "90210", &FailsFor("custom"), &fallback);

        assert!(quote.has_estimates());
        assert!(!quote.packages[0].estimated);
        assert!(quote.packages[1].estimated);
        assert_eq!(quote.packages[1].rate, fallback.estimate(&packages[1]));
        assert_eq!(quote.total, round2(5.0 + quote.packages[1].rate));
    }

    #[test]
    fn estimator_is_a_rate_source() {
        let estimator = DimensionalWeightEstimator::default();
        let packages = vec![package("cube", (4.0, 4.0, 4.0), 16.0)];
        let quote = quote_shipment(&packages, "10001", &estimator, &estimator);
        assert!(!quote.has_estimates());
        assert_eq!(quote.total, 9.25);
        assert_eq!(packages[0].dims, Dims::new(4.0, 4.0, 4.0));
    }
}
