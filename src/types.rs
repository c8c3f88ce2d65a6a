//! Common types and traits for parcel geometry.
//!
//! This module defines the dimension triple shared by items, shipping boxes
//! and flat-rate boxes, together with the trait abstractions used by the fit
//! tester and the packer.

use std::ops::Add;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Ounces per pound, used when reporting package weights in pounds.
pub const OUNCES_PER_POUND: f64 = 16.0;

/// Interior or exterior dimensions of a parcel in inches.
///
/// # Examples
/// ```
/// use usps_box_packer::types::Dims;
///
/// let item = Dims::new(6.0, 5.0, 3.0);
/// assert_eq!(item.volume(), 90.0);
/// assert_eq!(item.min_edge(), 3.0);
/// assert_eq!(item.sorted_desc(), [6.0, 5.0, 3.0]);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Dims {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dims {
    /// Creates a new dimension triple.
    #[inline]
    pub const fn new(length: f64, width: f64, height: f64) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    /// Returns the edges as an array in (length, width, height) order.
    #[inline]
    pub const fn as_array(&self) -> [f64; 3] {
        [self.length, self.width, self.height]
    }

    /// Calculates the volume (product of all edges).
    #[inline]
    pub fn volume(&self) -> f64 {
        self.length * self.width * self.height
    }

    /// Shortest edge. Used as the "laid flat" stacking height.
    #[inline]
    pub fn min_edge(&self) -> f64 {
        self.length.min(self.width).min(self.height)
    }

    /// Edges sorted from longest to shortest.
    #[inline]
    pub fn sorted_desc(&self) -> [f64; 3] {
        let mut edges = self.as_array();
        edges.sort_by(|a, b| b.total_cmp(a));
        edges
    }

    /// Checks if every edge is `<=` the matching edge of `container`.
    ///
    /// No tolerance is applied: equal edges fit, anything larger does not.
    #[inline]
    pub fn fits_within(&self, container: &Self) -> bool {
        self.length <= container.length
            && self.width <= container.width
            && self.height <= container.height
    }

    /// Grows every edge by `padding`.
    #[inline]
    pub fn padded(&self, padding: f64) -> Self {
        *self + Self::new(padding, padding, padding)
    }
}

impl Add for Dims {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(
            self.length + rhs.length,
            self.width + rhs.width,
            self.height + rhs.height,
        )
    }
}

impl From<(f64, f64, f64)> for Dims {
    #[inline]
    fn from(tuple: (f64, f64, f64)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }
}

/// Trait for objects with 3D dimensions.
pub trait Dimensional {
    /// Returns the dimensions of the object.
    fn dimensions(&self) -> Dims;

    /// Calculates the volume.
    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }
}

/// Trait for objects with weight.
pub trait Weighted {
    /// Returns the weight in ounces.
    fn weight_oz(&self) -> f64;
}

/// Rounds a value to two decimal places.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Validation helpers shared by items, boxes and flat-rate boxes.
pub mod validation {
    use crate::model::ValidationError;

    /// Validates a single dimension.
    ///
    /// # Parameters
    /// * `value` - The value to validate
    /// * `name` - Name of the dimension for error messages
    pub fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
        if value.is_nan() || value.is_infinite() || value <= 0.0 {
            return Err(ValidationError::InvalidDimension(format!(
                "{} must be a positive finite number, got: {}",
                name, value
            )));
        }
        Ok(())
    }

    /// Validates a weight in ounces.
    pub fn validate_weight(value: f64, name: &str) -> Result<(), ValidationError> {
        if value.is_nan() || value.is_infinite() || value <= 0.0 {
            return Err(ValidationError::InvalidWeight(format!(
                "{} must be a positive finite number, got: {}",
                name, value
            )));
        }
        Ok(())
    }

    /// Validates a weight that may be zero (e.g. tare of a poly mailer).
    pub fn validate_non_negative_weight(value: f64, name: &str) -> Result<(), ValidationError> {
        if value.is_nan() || value.is_infinite() || value < 0.0 {
            return Err(ValidationError::InvalidWeight(format!(
                "{} must be zero or a positive finite number, got: {}",
                name, value
            )));
        }
        Ok(())
    }

    /// Validates all three edges of a parcel.
    pub fn validate_dims(dims: &crate::types::Dims, owner: &str) -> Result<(), ValidationError> {
        validate_dimension(dims.length, &format!("{owner} length"))?;
        validate_dimension(dims.width, &format!("{owner} width"))?;
        validate_dimension(dims.height, &format!("{owner} height"))?;
        Ok(())
    }
}
