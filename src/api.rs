//! REST API for the packing service.
//!
//! Exposes packing, flat-rate comparison and shipment quoting over HTTP.
//! Uses Axum as the web framework and supports CORS.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, OptimizerConfig, RateConfig};
use crate::flat_rate::{
    DecisionReason, FlatRateBox, FlatRateChoice, FlatRateDecision, FlatRatePolicy,
    FlatRatePrices, FlatRateSettings, PricingTier, compare_flat_rate_vs_calculated,
};
use crate::inventory::{BoxInventoryProvider, FlatRateCatalogProvider};
use crate::model::{
    BoxDefinition, BoxInventory, BoxKind, CartLine, Item, Package, ValidationError, expand_cart,
};
use crate::optimizer::{PackingResult, pack_items_with_config, pack_items_with_progress};
use crate::rates::{PackageRate, ShipmentQuote, quote_shipment};
use crate::types::{Dims, OUNCES_PER_POUND, round2};

#[derive(Clone)]
pub struct ApiState {
    optimizer_config: OptimizerConfig,
    rate_config: RateConfig,
    inventory: Arc<dyn BoxInventoryProvider + Send + Sync>,
    flat_rate: Arc<dyn FlatRateCatalogProvider + Send + Sync>,
}

impl ApiState {
    pub fn new(
        optimizer_config: OptimizerConfig,
        rate_config: RateConfig,
        inventory: Arc<dyn BoxInventoryProvider + Send + Sync>,
        flat_rate: Arc<dyn FlatRateCatalogProvider + Send + Sync>,
    ) -> Self {
        Self {
            optimizer_config,
            rate_config,
            inventory,
            flat_rate,
        }
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>usps-box-packer API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request structure for the packing endpoints.
///
/// `boxes` overrides the configured inventory for this request only.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "items": [
            { "id": "A", "length": 8.0, "width": 6.0, "height": 4.0, "weight": 300.0, "quantity": 1 },
            { "id": "B", "length": 6.0, "width": 5.0, "height": 3.0, "weight": 100.0, "quantity": 1 }
        ],
        "boxes": {
            "box_small": { "length": 8.0, "width": 6.0, "height": 4.0, "max_weight": 320.0 },
            "box_medium": { "length": 12.0, "width": 10.0, "height": 8.0, "max_weight": 480.0 }
        }
    })
)]
pub struct PackRequest {
    pub items: Vec<CartLine>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub boxes: Option<BTreeMap<String, BoxDefinition>>,
}

#[derive(Debug)]
struct ValidatedPackRequest {
    items: Vec<Item>,
    inventory: BoxInventory,
}

#[derive(Debug)]
enum PackRequestValidationError {
    InvalidItem(ValidationError),
    InvalidInventory(ValidationError),
}

impl PackRequest {
    fn into_validated(
        self,
        fallback: &dyn BoxInventoryProvider,
    ) -> Result<ValidatedPackRequest, PackRequestValidationError> {
        let items = expand_cart(&self.items).map_err(PackRequestValidationError::InvalidItem)?;
        let inventory = match self.boxes {
            Some(boxes) => {
                BoxInventory::new(boxes).map_err(PackRequestValidationError::InvalidInventory)?
            }
            None => fallback.box_inventory(),
        };
        Ok(ValidatedPackRequest { items, inventory })
    }
}

/// Response structure with all packages.
#[derive(Serialize, ToSchema)]
pub struct PackResponse {
    pub packages: Vec<PackageSummary>,
    pub package_count: usize,
    pub oversized_count: usize,
    pub total_weight_oz: f64,
    pub total_weight_lbs: f64,
}

/// A finalized package as consumed by rating and label printing.
#[derive(Serialize, ToSchema)]
pub struct PackageSummary {
    pub id: usize,
    pub box_type: String,
    pub name: Option<String>,
    pub dims: Dims,
    pub weight_oz: f64,
    pub weight_lbs: f64,
    pub item_count: usize,
    pub item_ids: Vec<String>,
    pub utilization_percent: f64,
    pub is_oversized: bool,
}

impl PackageSummary {
    fn from_package(id: usize, package: &Package) -> Self {
        Self {
            id,
            box_type: package.box_type.clone(),
            name: package.name.clone(),
            dims: package.dims,
            weight_oz: package.weight_oz,
            weight_lbs: package.weight_lbs(),
            item_count: package.item_count(),
            item_ids: package.items.iter().map(|i| i.id.clone()).collect(),
            utilization_percent: round2(package.utilization_percent()),
            is_oversized: package.is_oversized,
        }
    }
}

impl PackResponse {
    /// Creates a PackResponse from a PackingResult.
    pub fn from_packing_result(result: &PackingResult) -> Self {
        let total_weight_oz = result.total_weight_oz();
        Self {
            packages: result
                .packages
                .iter()
                .enumerate()
                .map(|(i, package)| PackageSummary::from_package(i + 1, package))
                .collect(),
            package_count: result.package_count(),
            oversized_count: result.oversized_count(),
            total_weight_oz,
            total_weight_lbs: round2(total_weight_oz / OUNCES_PER_POUND),
        }
    }
}

/// Request for a flat-rate comparison. Unset settings use the configured ones.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "calculated_rate": 14.25,
        "items": [
            { "id": "book", "length": 8.0, "width": 5.0, "height": 1.5, "weight": 20.0, "quantity": 1 }
        ],
        "policy": "cheaper"
    })
)]
pub struct FlatRateRequest {
    pub calculated_rate: f64,
    pub items: Vec<CartLine>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub policy: Option<FlatRatePolicy>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub tier: Option<PricingTier>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub markup: Option<f64>,
}

/// Flat-rate decision with a readable reason.
#[derive(Serialize, ToSchema)]
pub struct FlatRateResponse {
    pub use_flat_rate: bool,
    pub rate: f64,
    pub flat_rate_box: Option<FlatRateChoice>,
    pub reason_code: String,
    pub reason: String,
}

impl From<FlatRateDecision> for FlatRateResponse {
    fn from(decision: FlatRateDecision) -> Self {
        Self {
            use_flat_rate: decision.use_flat_rate,
            rate: decision.rate,
            flat_rate_box: decision.flat_rate_box,
            reason_code: decision.reason.code().to_string(),
            reason: decision.reason.to_string(),
        }
    }
}

/// Request for a full quote: pack, rate every package, compare with flat rate.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "destination": "90210",
        "items": [
            { "id": "mug", "length": 6.0, "width": 5.0, "height": 3.0, "weight": 100.0, "quantity": 2 }
        ]
    })
)]
pub struct QuoteRequest {
    pub destination: String,
    pub items: Vec<CartLine>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub boxes: Option<BTreeMap<String, BoxDefinition>>,
}

#[derive(Serialize, ToSchema)]
pub struct QuoteResponse {
    pub packing: PackResponse,
    pub calculated: ShipmentQuote,
    pub flat_rate: FlatRateResponse,
    /// The rate to charge at checkout.
    pub rate: f64,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn box_config_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid box configuration",
        details,
    )
}

fn parse_pack_request(
    payload: Result<Json<PackRequest>, JsonRejection>,
    state: &ApiState,
) -> Result<ValidatedPackRequest, Response> {
    let Json(payload) = payload.map_err(json_deserialize_error)?;
    validate_pack_request(payload, state)
}

fn validate_pack_request(
    payload: PackRequest,
    state: &ApiState,
) -> Result<ValidatedPackRequest, Response> {
    match payload.into_validated(state.inventory.as_ref()) {
        Ok(validated) => Ok(validated),
        Err(PackRequestValidationError::InvalidItem(err)) => Err(validation_error(err.to_string())),
        Err(PackRequestValidationError::InvalidInventory(err)) => {
            Err(box_config_error(err.to_string()))
        }
    }
}

fn flat_rate_settings(state: &ApiState, request: &FlatRateRequest) -> FlatRateSettings {
    let configured = state.rate_config.flat_rate_settings();
    FlatRateSettings {
        tier: request.tier.unwrap_or(configured.tier),
        markup: request.markup.unwrap_or(configured.markup),
        policy: request.policy.unwrap_or(configured.policy),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_pack,
        handle_pack_stream,
        handle_flat_rate,
        handle_quote,
        list_boxes,
        list_flat_rate_boxes
    ),
    components(
        schemas(
            PackRequest,
            PackResponse,
            PackageSummary,
            FlatRateRequest,
            FlatRateResponse,
            QuoteRequest,
            QuoteResponse,
            ErrorResponse,
            CartLine,
            BoxDefinition,
            BoxKind,
            Dims,
            FlatRateBox,
            FlatRatePrices,
            FlatRateChoice,
            FlatRatePolicy,
            PricingTier,
            DecisionReason,
            ShipmentQuote,
            PackageRate
        )
    ),
    tags(
        (name = "packing", description = "Box selection for a cart"),
        (name = "rates", description = "Flat-rate comparison and shipment quotes"),
        (name = "catalogs", description = "Configured boxes")
    )
)]
struct ApiDoc;

/// Builds the router with all endpoints.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/pack", post(handle_pack))
        .route("/pack_stream", post(handle_pack_stream))
        .route("/rates/flat-rate", post(handle_flat_rate))
        .route("/quote", post(handle_quote))
        .route("/boxes", get(list_boxes))
        .route("/flat-rate-boxes", get(list_flat_rate_boxes))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server.
///
/// Blocks until the server is terminated.
pub async fn start_api_server(config: ApiConfig, state: ApiState) -> std::io::Result<()> {
    let app = router(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        "🚀 Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        info!("💡 Local access: http://localhost:{}", config.port());
    }
    info!("📦 Endpoints: POST /pack, POST /pack_stream, POST /rates/flat-rate, POST /quote");
    info!("📑 Documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /pack endpoint.
///
/// Expands the cart and packs it into boxes from the inventory.
#[utoipa::path(
    post,
    path = "/pack",
    request_body = PackRequest,
    responses(
        (status = 200, description = "Packed cart", body = PackResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid items or box configuration",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_pack_request(payload, &state) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(
        "📥 New pack request: {} items, {} box types",
        request.items.len(),
        request.inventory.len()
    );
    let result = pack_items_with_config(
        request.items,
        &request.inventory,
        state.optimizer_config.packing_config(),
    );
    info!(
        "📦 Result: {} packages, {} oversized",
        result.package_count(),
        result.oversized_count()
    );

    (StatusCode::OK, Json(PackResponse::from_packing_result(&result))).into_response()
}

/// Handler for POST /pack_stream endpoint (SSE).
///
/// Streams pack events as Server-Sent Events (text/event-stream).
#[utoipa::path(
    post,
    path = "/pack_stream",
    request_body = PackRequest,
    responses(
        (
            status = 200,
            description = "Streams pack events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid items or box configuration",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_pack_request(payload, &state) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);
    let packing_config = state.optimizer_config.packing_config();
    let ValidatedPackRequest { items, inventory } = request;

    tokio::task::spawn_blocking(move || {
        pack_items_with_progress(items, &inventory, packing_config, |evt| {
            match serde_json::to_string(evt) {
                // A closed receiver only means the client went away.
                Ok(json) => {
                    let _ = tx.blocking_send(json);
                }
                Err(err) => error!("❌ Could not serialize pack event: {err}"),
            }
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /rates/flat-rate endpoint.
///
/// Compares a calculated rate against the cheapest fitting flat-rate box.
#[utoipa::path(
    post,
    path = "/rates/flat-rate",
    request_body = FlatRateRequest,
    responses(
        (status = 200, description = "Comparison outcome", body = FlatRateResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "rates"
)]
async fn handle_flat_rate(
    State(state): State<ApiState>,
    payload: Result<Json<FlatRateRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    if !request.calculated_rate.is_finite() || request.calculated_rate < 0.0 {
        return validation_error(format!(
            "calculated_rate must be zero or a positive number, got: {}",
            request.calculated_rate
        ));
    }
    if let Some(markup) = request
        .markup
        .filter(|markup| !FlatRateSettings::is_valid_markup(*markup))
    {
        return validation_error(format!(
            "markup must be zero or a positive number, got: {markup}"
        ));
    }
    if let Err(err) = request.items.iter().try_for_each(CartLine::validate) {
        return validation_error(err.to_string());
    }

    let settings = flat_rate_settings(&state, &request);
    let catalog = state.flat_rate.flat_rate_boxes();
    let decision =
        compare_flat_rate_vs_calculated(request.calculated_rate, &request.items, &catalog, &settings);
    info!(
        "📮 Flat-rate decision: use_flat_rate={} rate={:.2} ({})",
        decision.use_flat_rate,
        decision.rate,
        decision.reason.code()
    );

    (StatusCode::OK, Json(FlatRateResponse::from(decision))).into_response()
}

/// Handler for POST /quote endpoint.
///
/// Packs the cart, prices each package with the fallback estimator and lets
/// the flat-rate comparator decide the final rate.
#[utoipa::path(
    post,
    path = "/quote",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Shipment quote", body = QuoteResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "rates"
)]
async fn handle_quote(
    State(state): State<ApiState>,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    let QuoteRequest {
        destination,
        items: lines,
        boxes,
    } = request;

    let validated = match validate_pack_request(
        PackRequest {
            items: lines.clone(),
            boxes,
        },
        &state,
    ) {
        Ok(validated) => validated,
        Err(response) => return response,
    };

    let result = pack_items_with_config(
        validated.items,
        &validated.inventory,
        state.optimizer_config.packing_config(),
    );
    let estimator = state.rate_config.estimator();
    let calculated = quote_shipment(&result.packages, &destination, &estimator, &estimator);

    let catalog = state.flat_rate.flat_rate_boxes();
    let decision = compare_flat_rate_vs_calculated(
        calculated.total,
        &lines,
        &catalog,
        &state.rate_config.flat_rate_settings(),
    );
    info!(
        "🧾 Quote for {}: {} packages, calculated {:.2}, charged {:.2}",
        destination,
        result.package_count(),
        calculated.total,
        decision.rate
    );

    let response = QuoteResponse {
        packing: PackResponse::from_packing_result(&result),
        rate: decision.rate,
        calculated,
        flat_rate: FlatRateResponse::from(decision),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for GET /boxes: the configured box inventory.
#[utoipa::path(
    get,
    path = "/boxes",
    responses((status = 200, description = "Box inventory", body = BTreeMap<String, BoxDefinition>)),
    tag = "catalogs"
)]
async fn list_boxes(State(state): State<ApiState>) -> impl IntoResponse {
    let inventory = state.inventory.box_inventory();
    let boxes: BTreeMap<&str, &BoxDefinition> = inventory.iter().collect();
    Json(serde_json::json!(boxes))
}

/// Handler for GET /flat-rate-boxes: the configured flat-rate catalog.
#[utoipa::path(
    get,
    path = "/flat-rate-boxes",
    responses((status = 200, description = "Flat-rate catalog", body = BTreeMap<String, FlatRateBox>)),
    tag = "catalogs"
)]
async fn list_flat_rate_boxes(State(state): State<ApiState>) -> impl IntoResponse {
    let catalog = state.flat_rate.flat_rate_boxes();
    let boxes: BTreeMap<&str, &FlatRateBox> = catalog.iter().collect();
    Json(serde_json::json!(boxes))
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::StaticCatalogs;

    fn test_state() -> ApiState {
        crate::logging::init_test();
        let catalogs = Arc::new(StaticCatalogs::default());
        ApiState::new(
            OptimizerConfig::default(),
            RateConfig::default(),
            catalogs.clone(),
            catalogs,
        )
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    fn scenario_request() -> PackRequest {
        serde_json::from_value(json!({
            "items": [
                { "id": "A", "length": 8.0, "width": 6.0, "height": 4.0, "weight": 300.0 },
                { "id": "B", "length": 6.0, "width": 5.0, "height": 3.0, "weight": 100.0 }
            ],
            "boxes": {
                "box_small": { "length": 8.0, "width": 6.0, "height": 4.0, "max_weight": 320.0 },
                "box_medium": { "length": 12.0, "width": 10.0, "height": 8.0, "max_weight": 480.0 }
            }
        }))
        .expect("valid request")
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        for path in ["/pack", "/pack_stream", "/rates/flat-rate", "/quote", "/boxes"] {
            assert!(
                paths.contains_key(path),
                "OpenAPI documentation is missing the {} path",
                path
            );
        }
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        for name in ["PackRequest", "PackResponse", "FlatRateResponse", "ErrorResponse"] {
            assert!(
                components.schemas.contains_key(name),
                "Expected schema '{}' is missing from the OpenAPI document",
                name
            );
        }
    }

    #[test]
    fn pack_request_without_boxes_uses_configured_inventory() {
        let request: PackRequest = serde_json::from_str(
            r#"{"items": [{"id": "x", "length": 1, "width": 1, "height": 1, "weight": 1}]}"#,
        )
        .expect("Should parse valid JSON");
        assert!(request.boxes.is_none());

        let state = test_state();
        let validated = request
            .into_validated(state.inventory.as_ref())
            .expect("Should validate successfully");
        assert_eq!(validated.inventory, state.inventory.box_inventory());
        assert_eq!(validated.items.len(), 1);
    }

    #[test]
    fn pack_request_rejects_empty_box_override() {
        let request: PackRequest = serde_json::from_str(
            r#"{"items": [{"id": "x", "length": 1, "width": 1, "height": 1, "weight": 1}],
                "boxes": {}}"#,
        )
        .expect("Should parse valid JSON");
        let state = test_state();
        assert!(matches!(
            request.into_validated(state.inventory.as_ref()),
            Err(PackRequestValidationError::InvalidInventory(_))
        ));
    }

    #[tokio::test]
    async fn pack_endpoint_returns_two_small_boxes_for_heavy_pair() {
        let response = handle_pack(State(test_state()), Ok(Json(scenario_request())))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["package_count"], 2);
        assert_eq!(body["packages"][0]["box_type"], "box_small");
        assert_eq!(body["packages"][1]["box_type"], "box_small");
        assert_eq!(body["packages"][0]["weight_oz"], 300.0);
        assert_eq!(body["packages"][0]["weight_lbs"], 18.75);
        assert_eq!(body["packages"][0]["utilization_percent"], 100.0);
        assert_eq!(body["packages"][1]["utilization_percent"], 46.88);
        assert_eq!(body["total_weight_oz"], 400.0);
    }

    #[tokio::test]
    async fn pack_endpoint_rejects_invalid_items() {
        let request: PackRequest = serde_json::from_value(json!({
            "items": [{ "id": "x", "length": 0.0, "width": 1.0, "height": 1.0, "weight": 1.0 }]
        }))
        .expect("valid JSON");
        let response = handle_pack(State(test_state()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid input data");
    }

    #[tokio::test]
    async fn pack_endpoint_rejects_excessive_quantity() {
        let request: PackRequest = serde_json::from_value(json!({
            "items": [{
                "id": "bulk", "length": 1.0, "width": 1.0, "height": 1.0,
                "weight": 1.0, "quantity": u32::MAX
            }]
        }))
        .expect("valid JSON");
        let response = handle_pack(State(test_state()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(
            body["details"]
                .as_str()
                .is_some_and(|details| details.contains("quantity"))
        );
    }

    #[tokio::test]
    async fn pack_stream_emits_events_until_finished() {
        let response = handle_pack_stream(State(test_state()), Ok(Json(scenario_request())))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(axum::http::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("text/event-stream")
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("stream should end after the last event");
        let text = String::from_utf8(bytes.to_vec()).expect("events are UTF-8");
        let events: Vec<serde_json::Value> = text
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .filter_map(|data| serde_json::from_str(data).ok())
            .collect();

        let types: Vec<&str> = events.iter().filter_map(|e| e["type"].as_str()).collect();
        assert_eq!(
            types,
            vec!["BoxOpened", "ItemPlaced", "BoxOpened", "ItemPlaced", "Finished"]
        );
        assert_eq!(events[4]["packages"], 2);
    }

    #[tokio::test]
    async fn flat_rate_endpoint_rejects_negative_markup() {
        let request: FlatRateRequest = serde_json::from_value(json!({
            "calculated_rate": 12.0,
            "items": [{ "id": "book", "length": 8.0, "width": 5.0, "height": 1.5, "weight": 20.0 }],
            "markup": -50.0
        }))
        .expect("valid JSON");
        let response = handle_flat_rate(State(test_state()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid input data");
    }

    #[tokio::test]
    async fn flat_rate_endpoint_honours_request_policy() {
        let request: FlatRateRequest = serde_json::from_value(json!({
            "calculated_rate": 4.0,
            "items": [{ "id": "book", "length": 8.0, "width": 5.0, "height": 1.5, "weight": 20.0 }],
            "policy": "always"
        }))
        .expect("valid JSON");
        let response = handle_flat_rate(State(test_state()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["use_flat_rate"], true);
        assert_eq!(body["reason_code"], "policy_always");
        assert_eq!(body["flat_rate_box"]["key"], "small_flat_rate_box");
    }

    #[tokio::test]
    async fn flat_rate_endpoint_rejects_negative_rate() {
        let request: FlatRateRequest = serde_json::from_value(json!({
            "calculated_rate": -1.0,
            "items": []
        }))
        .expect("valid JSON");
        let response = handle_flat_rate(State(test_state()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn quote_endpoint_charges_the_cheaper_option() {
        let request: QuoteRequest = serde_json::from_value(json!({
            "destination": "90210",
            "items": [{ "id": "book", "length": 8.0, "width": 5.0, "height": 1.5, "weight": 20.0 }]
        }))
        .expect("valid JSON");
        let response = handle_quote(State(test_state()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["packing"]["package_count"], 1);
        // Small box, 23 oz shipping weight bills as 2 lb: 8.00 + 2 × 1.25.
        assert_eq!(body["calculated"]["total"], 10.5);
        assert_eq!(body["flat_rate"]["use_flat_rate"], true);
        assert_eq!(body["rate"], 10.4);
    }
}
