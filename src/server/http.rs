//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo, one task per connection.

use alloy::primitives::Address;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::chain::{parse_address, ChainContext};
use crate::config::Args;
use crate::identity::{
    spawn_cleanup_task, CircuitKey, IdentityWorkflow, Iden3Verifier, VerificationStore,
};
use crate::registry::RegistryClient;
use crate::routes;
use crate::services::{tracked_tokens, PortfolioService, RegistryViews};
use crate::strategy::{DipBuyer, HttpPriceOracle, RouterSwapExecutor};
use crate::types::{AgentError, Result};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Interval of the session cleanup sweep
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub started_at: Instant,
    /// Operator wallet address
    pub operator: Address,
    pub registry: Arc<RegistryClient>,
    pub sessions: Arc<VerificationStore>,
    pub identity: IdentityWorkflow,
    pub dip_buyer: DipBuyer,
    pub portfolio: PortfolioService,
    pub views: RegistryViews,
}

/// Optional contract address from config: empty means zero, malformed is an error
fn address_setting(name: &str, value: &str) -> Result<Address> {
    if value.trim().is_empty() {
        return Ok(Address::ZERO);
    }
    parse_address(value).map_err(|e| AgentError::Config(format!("{}: {}", name, e)))
}

impl AppState {
    /// Build the provider, clients and workflows from validated args
    pub fn new(args: Args) -> Result<Self> {
        let rpc_url = args
            .rpc_url
            .as_deref()
            .ok_or_else(|| AgentError::Config("KATANA_RPC_URL is required".to_string()))?;
        let private_key = args
            .agent_private_key
            .as_deref()
            .ok_or_else(|| AgentError::Config("AGENT_PRIVATE_KEY is required".to_string()))?;
        let chain = ChainContext::connect(rpc_url, private_key)?;

        let registry_address = args
            .registry_address()
            .map(|a| address_setting("REGISTRY_CONTRACT_ADDRESS", a))
            .transpose()?
            .filter(|a| !a.is_zero());
        let registry = Arc::new(RegistryClient::new(chain.provider().clone(), registry_address));

        let sessions = Arc::new(VerificationStore::new(
            Duration::from_secs(args.session_ttl_secs),
            Duration::from_secs(args.verified_ttl_secs),
        ));

        let auth_v2_key = CircuitKey::load_auth_v2(&args.circuits_dir)?;
        let identity = IdentityWorkflow::new(
            Arc::clone(&sessions),
            Arc::new(Iden3Verifier::with_default_resolvers(auth_v2_key)?),
            registry.clone(),
            args.privado_verifier_did.clone(),
            args.public_url(),
        );

        let oracle = HttpPriceOracle::new(
            args.price_feed_url.clone(),
            Duration::from_millis(args.price_feed_timeout_ms),
        );
        let executor = RouterSwapExecutor::new(
            chain.provider().clone(),
            chain.operator(),
            address_setting("SUSHI_ROUTER_ADDRESS", &args.sushi_router_address)?,
            address_setting("VBUSDC_TOKEN_ADDRESS", &args.vbusdc_token_address)?,
            address_setting("WETH_TOKEN_ADDRESS", &args.weth_token_address)?,
        );
        let dip_buyer = DipBuyer::new(Arc::new(oracle), Arc::new(executor));

        // KAT is display-only; validate it here like the swap tokens
        address_setting("KAT_TOKEN_ADDRESS", &args.kat_token_address)?;
        let portfolio = PortfolioService::new(chain.provider().clone(), tracked_tokens(&args));
        let views = RegistryViews::new(Arc::clone(&registry), args.event_lookback_blocks);

        Ok(Self {
            started_at: Instant::now(),
            operator: chain.operator(),
            registry,
            sessions,
            identity,
            dip_buyer,
            portfolio,
            views,
            args,
        })
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Agent backend listening on {}", state.args.listen);

    if !state.registry.is_configured() {
        warn!("REGISTRY_CONTRACT_ADDRESS not set - registration and dashboard views are disabled");
    }

    spawn_cleanup_task(Arc::clone(&state.sessions), SESSION_CLEANUP_INTERVAL);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    info!("[{}] {} {}", addr, method, path);

    if method == Method::OPTIONS {
        return Ok(to_boxed(preflight_response()));
    }

    let body = if method == Method::POST {
        match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("[{}] Failed to read request body: {}", addr, e);
                return Ok(to_boxed(bad_request_response("Failed to read request body")));
            }
        }
    } else {
        Bytes::new()
    };

    let response = route(&state, &method, &path, query.as_deref(), &body).await;

    Ok(to_boxed(response))
}

/// Dispatch a request to its route handler
async fn route(
    state: &Arc<AppState>,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: &Bytes,
) -> Response<Full<Bytes>> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        (&Method::GET, ["health"]) | (&Method::GET, ["healthz"]) => {
            routes::health_check(Arc::clone(state))
        }
        (&Method::GET, ["version"]) => routes::version_info(),

        // Identity verification
        (&Method::POST, ["identity", "start"]) => routes::handle_start(Arc::clone(state), body),
        (&Method::POST, ["identity", "callback"]) => {
            routes::handle_callback(Arc::clone(state), query, body).await
        }
        (&Method::GET, ["identity", "status", session_id]) => {
            routes::handle_status(Arc::clone(state), session_id)
        }
        (&Method::POST, ["identity", "complete"]) => {
            routes::handle_complete(Arc::clone(state), body).await
        }

        // Agents
        (&Method::GET, ["agents"]) => routes::handle_agents(Arc::clone(state)).await,
        (&Method::GET, ["agents", "human", address]) => {
            routes::handle_human_lookup(Arc::clone(state), address).await
        }
        (&Method::GET, ["agents", address, "portfolio"]) => {
            routes::handle_portfolio(Arc::clone(state), address).await
        }
        (&Method::POST, ["agents", address, "strategies", strategy, "run"]) => {
            routes::handle_run_strategy(Arc::clone(state), address, strategy, body).await
        }

        // Dashboard
        (&Method::GET, ["metrics", "wave3"]) => routes::handle_metrics(Arc::clone(state)).await,
        (&Method::GET, ["pools"]) => routes::handle_pools(),
        (&Method::GET, ["activity"]) => routes::handle_activity(Arc::clone(state)).await,

        _ => not_found_response(path),
    }
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Bad request response
fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Bad Request",
        "message": message
    });

    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
