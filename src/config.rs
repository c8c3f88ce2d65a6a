use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::{info, warn};

use crate::flat_rate::{FlatRateCatalog, FlatRatePolicy, FlatRateSettings, PricingTier};
use crate::inventory::{
    StaticCatalogs, default_box_inventory, load_box_inventory, load_flat_rate_catalog,
};
use crate::optimizer::PackingConfig;
use crate::rates::DimensionalWeightEstimator;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub optimizer: OptimizerConfig,
    pub rates: RateConfig,
    pub catalogs: CatalogConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            optimizer: OptimizerConfig::from_env(),
            rates: RateConfig::from_env(),
            catalogs: CatalogConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        let host_value =
            env_string("USPS_PACKER_API_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "⚠️ Could not parse USPS_PACKER_API_HOST ('{}'): {}. Using {}.",
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string("USPS_PACKER_API_PORT") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!(
                        "⚠️ USPS_PACKER_API_PORT must not be 0. Using {}.",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        "⚠️ Could not parse USPS_PACKER_API_PORT ('{}'): {}. Using {}.",
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Configuration for the packing heuristic.
#[derive(Clone, Debug, Default)]
pub struct OptimizerConfig {
    packing: PackingConfig,
}

impl OptimizerConfig {
    const EFFICIENCY_VAR: &'static str = "USPS_PACKER_PACKING_EFFICIENCY";
    const OVERSIZE_PADDING_VAR: &'static str = "USPS_PACKER_OVERSIZE_PADDING";
    const OVERSIZE_TARE_VAR: &'static str = "USPS_PACKER_OVERSIZE_TARE";

    fn from_env() -> Self {
        let packing_efficiency = load_f64_with_warning(
            Self::EFFICIENCY_VAR,
            PackingConfig::DEFAULT_PACKING_EFFICIENCY,
            |value| value > 0.0 && value <= 1.0,
            "must be greater than 0 and at most 1",
            "Warning: Adjusted packing efficiency changes how many boxes are opened",
        );

        let oversize_padding = load_f64_with_warning(
            Self::OVERSIZE_PADDING_VAR,
            PackingConfig::DEFAULT_OVERSIZE_PADDING,
            |value| value >= 0.0,
            "must not be negative",
            "Warning: Adjusted padding changes dimensions of oversized packages",
        );

        let oversize_tare = load_f64_with_warning(
            Self::OVERSIZE_TARE_VAR,
            PackingConfig::DEFAULT_OVERSIZE_TARE,
            |value| value >= 0.0,
            "must not be negative",
            "Warning: Adjusted tare changes weights of oversized packages",
        );

        let packing = PackingConfig::builder()
            .packing_efficiency(packing_efficiency)
            .oversize_padding(oversize_padding)
            .oversize_tare(oversize_tare)
            .build();

        Self { packing }
    }

    /// Returns the configured PackingConfig.
    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }
}

/// Pricing settings: flat-rate policy and the fallback estimator.
#[derive(Clone, Debug, Default)]
pub struct RateConfig {
    flat_rate: FlatRateSettings,
    estimator: DimensionalWeightEstimator,
}

impl RateConfig {
    const TIER_VAR: &'static str = "USPS_PACKER_PRICING_TIER";
    const POLICY_VAR: &'static str = "USPS_PACKER_FLAT_RATE_POLICY";
    const MARKUP_VAR: &'static str = "USPS_PACKER_FLAT_RATE_MARKUP";
    const BASE_RATE_VAR: &'static str = "USPS_PACKER_FALLBACK_BASE_RATE";
    const PER_POUND_VAR: &'static str = "USPS_PACKER_FALLBACK_PER_POUND_RATE";
    const DIM_DIVISOR_VAR: &'static str = "USPS_PACKER_DIM_DIVISOR";

    fn from_env() -> Self {
        let tier = env_string(Self::TIER_VAR)
            .and_then(|raw| parse_setting::<PricingTier>(&raw, Self::TIER_VAR))
            .unwrap_or_default();
        let policy = env_string(Self::POLICY_VAR)
            .and_then(|raw| parse_setting::<FlatRatePolicy>(&raw, Self::POLICY_VAR))
            .unwrap_or_default();
        let markup = load_f64_with_warning(
            Self::MARKUP_VAR,
            0.0,
            FlatRateSettings::is_valid_markup,
            "must be zero or a positive number",
            "Note: Flat-rate prices include a markup",
        );

        let estimator = DimensionalWeightEstimator {
            base_rate: load_f64_with_warning(
                Self::BASE_RATE_VAR,
                DimensionalWeightEstimator::DEFAULT_BASE_RATE,
                |value| value >= 0.0,
                "must not be negative",
                "Note: Fallback base rate adjusted",
            ),
            per_pound_rate: load_f64_with_warning(
                Self::PER_POUND_VAR,
                DimensionalWeightEstimator::DEFAULT_PER_POUND_RATE,
                |value| value >= 0.0,
                "must not be negative",
                "Note: Fallback per-pound rate adjusted",
            ),
            dim_divisor: load_f64_with_warning(
                Self::DIM_DIVISOR_VAR,
                DimensionalWeightEstimator::DEFAULT_DIM_DIVISOR,
                |value| value > 0.0,
                "must be greater than 0",
                "Warning: Adjusted dimensional divisor changes estimated rates",
            ),
        };

        Self {
            flat_rate: FlatRateSettings {
                tier,
                markup,
                policy,
            },
            estimator,
        }
    }

    /// Tier, markup and policy for flat-rate comparison.
    pub fn flat_rate_settings(&self) -> FlatRateSettings {
        self.flat_rate
    }

    /// Estimator used when no carrier rate is available.
    pub fn estimator(&self) -> DimensionalWeightEstimator {
        self.estimator
    }
}

/// Where the box inventory and flat-rate catalog come from.
#[derive(Clone, Debug, Default)]
pub struct CatalogConfig {
    box_inventory_file: Option<String>,
    flat_rate_catalog_file: Option<String>,
}

impl CatalogConfig {
    const INVENTORY_FILE_VAR: &'static str = "USPS_PACKER_BOX_INVENTORY_FILE";
    const FLAT_RATE_FILE_VAR: &'static str = "USPS_PACKER_FLAT_RATE_CATALOG_FILE";

    fn from_env() -> Self {
        Self {
            box_inventory_file: env_string(Self::INVENTORY_FILE_VAR),
            flat_rate_catalog_file: env_string(Self::FLAT_RATE_FILE_VAR),
        }
    }

    /// Loads both catalogs, falling back to the built-in defaults when a file
    /// is not configured or cannot be used.
    pub fn load(&self) -> StaticCatalogs {
        let inventory = match &self.box_inventory_file {
            Some(path) => match load_box_inventory(path) {
                Ok(inventory) => {
                    info!("📦 Loaded {} boxes from {}", inventory.len(), path);
                    inventory
                }
                Err(err) => {
                    warn!("⚠️ {}. Using the default box inventory.", err);
                    default_box_inventory()
                }
            },
            None => default_box_inventory(),
        };

        let flat_rate = match &self.flat_rate_catalog_file {
            Some(path) => match load_flat_rate_catalog(path) {
                Ok(catalog) => {
                    info!("📮 Loaded {} flat-rate boxes from {}", catalog.len(), path);
                    catalog
                }
                Err(err) => {
                    warn!("⚠️ {}. Using the USPS default flat-rate catalog.", err);
                    FlatRateCatalog::usps_default()
                }
            },
            None => FlatRateCatalog::usps_default(),
        };

        StaticCatalogs::new(inventory, flat_rate)
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("⚠️ Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_setting<T>(raw: &str, var_name: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("⚠️ {} ({}). Using default value.", err, var_name);
            None
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => parse_f64_with_warning(&raw, var_name, default, validator, invalid_hint, warning),
        None => default,
    }
}

fn parse_f64_with_warning(
    raw: &str,
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match raw.parse::<f64>() {
        Ok(value) => {
            if !validator(value) {
                warn!(
                    "⚠️ {} contains invalid value '{}': {}. Using {}.",
                    var_name, raw, invalid_hint, default
                );
                default
            } else {
                let tolerance = (default.abs().max(1.0)) * 1e-9;
                if (value - default).abs() > tolerance {
                    info!("⚠️ {} ({} = {}).", warning, var_name, value);
                }
                value
            }
        }
        Err(err) => {
            warn!(
                "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                var_name, raw, err, default
            );
            default
        }
    }
}
