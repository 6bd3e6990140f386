use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_cookies::cookie::{SameSite, time};
use tower_cookies::{Cookie, CookieManagerLayer, Cookies};
use tracing::{debug, info};

use crate::config::Config;
use crate::consent::{AnalyticsTag, ConsentGate, ConsentSnapshot, ConsentStore, StoreError};
use crate::core::{ComputationResult, Field, InvalidInput, InvestmentInputs, compute_result};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

const FIELDS_PLACEHOLDER: &str = "<!-- fields -->";
const ANALYTICS_PLACEHOLDER: &str = "<!-- analytics -->";
const CONSENT_PLACEHOLDER: &str = "<!-- consent -->";
const CONSENT_STATE_OPEN: &str = r#"<script id="consent-state" type="application/json">"#;

// Browsers cap cookie lifetimes at 400 days.
const CONSENT_COOKIE_MAX_AGE: time::Duration = time::Duration::days(400);

#[derive(Parser, Debug)]
#[command(
    name = "cashflow",
    about = "Monthly cash-flow estimator for rental property investments"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the calculator page and JSON API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Compute the monthly payment and cash flow once and print them
    Calculate(CalculateArgs),
}

/// Values stay as text so the engine decides what is a valid number.
#[derive(Args, Debug, Clone)]
pub struct CalculateArgs {
    #[arg(long, allow_hyphen_values = true, help = "Property price in euros")]
    pub price: String,
    #[arg(long, allow_hyphen_values = true, help = "Down payment in euros")]
    pub down_payment: String,
    #[arg(long, allow_hyphen_values = true, help = "Loan amount in euros")]
    pub loan_amount: String,
    #[arg(
        long,
        allow_hyphen_values = true,
        help = "Annual interest rate in percent, e.g. 3.5"
    )]
    pub interest_rate: String,
    #[arg(long, allow_hyphen_values = true, help = "Loan duration in years")]
    pub loan_duration: String,
    #[arg(
        long,
        allow_hyphen_values = true,
        default_value = "0",
        help = "Monthly borrower insurance in euros"
    )]
    pub insurance: String,
    #[arg(long, allow_hyphen_values = true, help = "Monthly rent in euros")]
    pub rent: String,
    #[arg(
        long,
        allow_hyphen_values = true,
        default_value = "0",
        help = "Annual fees (property tax, co-ownership charges) in euros"
    )]
    pub fees: String,
}

impl From<CalculateArgs> for InvestmentInputs {
    fn from(args: CalculateArgs) -> Self {
        InvestmentInputs {
            price: args.price,
            down_payment: args.down_payment,
            loan_amount: args.loan_amount,
            interest_rate: args.interest_rate,
            loan_duration: args.loan_duration,
            insurance: args.insurance,
            rent: args.rent,
            fees: args.fees,
        }
    }
}

pub fn run_calculate(args: CalculateArgs) -> Result<String, InvalidInput> {
    let inputs = InvestmentInputs::from(args);
    let result = compute_result(&inputs)?;
    Ok(render_report(&result))
}

fn render_report(result: &ComputationResult) -> String {
    let verdict = if result.is_cashflow_positive() {
        "The investment generates a positive cash flow."
    } else {
        "Warning: negative cash flow. Check the parameters."
    };
    format!(
        "Loan payment + insurance: {} €\nMonthly cash flow: {} €\n{verdict}\n",
        result.monthly_payment_display(),
        result.monthly_cashflow_display(),
    )
}

/// One client's consent slot, carried in its own `cookie-consent` cookie.
#[derive(Clone)]
pub struct CookieStore {
    cookies: Cookies,
}

impl CookieStore {
    pub fn new(cookies: Cookies) -> Self {
        Self { cookies }
    }
}

impl ConsentStore for CookieStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.cookies.get(key).map(|cookie| cookie.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut cookie = Cookie::new(key.to_string(), value.to_string());
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_max_age(CONSENT_COOKIE_MAX_AGE);
        self.cookies.add(cookie);
        Ok(())
    }
}

#[derive(Clone)]
pub struct AppState {
    measurement_id: Option<String>,
    prompt_delay: Duration,
}

impl AppState {
    pub fn new(measurement_id: Option<String>, prompt_delay: Duration) -> Self {
        Self {
            measurement_id,
            prompt_delay,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.measurement_id.clone(), config.prompt_delay)
    }

    /// Each request replays the client's page lifetime from its own cookie.
    fn gate(&self, cookies: Cookies) -> ConsentGate<CookieStore> {
        ConsentGate::new(
            CookieStore::new(cookies),
            self.measurement_id.clone(),
            self.prompt_delay,
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CalculateResponse {
    result: Option<ComputationResult>,
    invalid_field: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/calculate",
            get(calculate_get_handler).post(calculate_post_handler),
        )
        .route("/api/consent", get(consent_handler))
        .route("/api/consent/accept", post(accept_handler))
        .route("/api/consent/decline", post(decline_handler))
        .fallback(not_found_handler)
        .layer(CookieManagerLayer::new())
        .with_state(state)
}

pub async fn run_http_server(port: u16, config: &Config) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(AppState::from_config(config));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, analytics = config.measurement_id.is_some(), "cashflow HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

/// Each page load is a fresh page lifetime for the client's consent gate.
/// The browser reveals the prompt itself, using the delay embedded in the page.
async fn index_handler(State(state): State<AppState>, cookies: Cookies) -> impl IntoResponse {
    let mut gate = state.gate(cookies);
    gate.mount();
    let analytics = gate.analytics().map(AnalyticsTag::render_snippet);
    if analytics.is_some() {
        gate.confirm_analytics_loaded();
    }
    let page = render_index(analytics.as_deref(), &gate.snapshot());
    with_cache_control(Html(page))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn calculate_get_handler(Query(inputs): Query<InvestmentInputs>) -> Response {
    calculate_handler_impl(&inputs)
}

async fn calculate_post_handler(Json(inputs): Json<InvestmentInputs>) -> Response {
    calculate_handler_impl(&inputs)
}

fn calculate_handler_impl(inputs: &InvestmentInputs) -> Response {
    let response = match compute_result(inputs) {
        Ok(result) => CalculateResponse {
            result: Some(result),
            invalid_field: None,
        },
        Err(err) => {
            debug!(%err, "calculation refused");
            CalculateResponse {
                result: None,
                invalid_field: err.field().map(Field::key),
            }
        }
    };
    json_response(StatusCode::OK, response)
}

async fn consent_handler(State(state): State<AppState>, cookies: Cookies) -> Response {
    let mut gate = state.gate(cookies);
    gate.mount();
    json_response(StatusCode::OK, gate.snapshot())
}

async fn accept_handler(State(state): State<AppState>, cookies: Cookies) -> Response {
    let mut gate = state.gate(cookies);
    gate.mount();
    gate.accept();
    // the client injects the returned tag right away
    gate.confirm_analytics_loaded();
    json_response(StatusCode::OK, gate.snapshot())
}

async fn decline_handler(State(state): State<AppState>, cookies: Cookies) -> Response {
    let mut gate = state.gate(cookies);
    gate.mount();
    gate.decline();
    json_response(StatusCode::OK, gate.snapshot())
}

fn render_index(analytics: Option<&str>, consent: &ConsentSnapshot) -> String {
    INDEX_HTML
        .replace(FIELDS_PLACEHOLDER, &render_form_fields())
        .replace(ANALYTICS_PLACEHOLDER, analytics.unwrap_or_default())
        .replace(CONSENT_PLACEHOLDER, &render_consent_state(consent))
}

fn render_consent_state(consent: &ConsentSnapshot) -> String {
    let json = serde_json::to_string(consent)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/");
    format!("{CONSENT_STATE_OPEN}{json}</script>")
}

fn render_form_fields() -> String {
    let mut out = String::new();
    for field in Field::ALL {
        let step = if field == Field::InterestRate { "0.01" } else { "any" };
        out.push_str(&format!(
            "<label class=\"field\">\n  <span>{label}</span>\n  <span class=\"input\"><input name=\"{key}\" type=\"number\" min=\"0\" step=\"{step}\" required aria-label=\"{aria}\"><em>{unit}</em></span>\n</label>\n",
            label = field.label(),
            key = field.key(),
            aria = field.accessible_name(),
            unit = field.unit(),
        ));
    }
    out
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
