//! Shipping-box selection and USPS flat-rate comparison for checkout.
//!
//! The packing pipeline is: [`model::expand_cart`] turns cart lines into
//! physical items, [`optimizer::pack_items`] assigns them to boxes from a
//! [`model::BoxInventory`], and [`flat_rate::compare_flat_rate_vs_calculated`]
//! decides whether a flat-rate box beats the calculated rate.

pub mod api;
pub mod config;
pub mod flat_rate;
pub mod geometry;
pub mod inventory;
pub mod logging;
pub mod model;
pub mod optimizer;
pub mod rates;
pub mod types;
