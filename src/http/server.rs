//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: proxy routes under the mount path, gateway
//!   diagnostic endpoints, JSON 404 fallback
//! - Wire up middleware (request ID, tracing, timeout, limits, Via header)
//! - Run the per-request pipeline: guard → propagate → forward → rewrite
//! - Apply hot-reloaded configuration by swapping the runtime state
//! - Serve plain TCP or TLS with graceful shutdown
//!
//! # Design Decisions
//! - When no upstream URL is configured, no gateway route is registered at
//!   all; every path falls through to the 404 handler
//! - The upstream client and parsed target live in an ArcSwap so reloads
//!   never stall in-flight requests

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::validation::validate_config;
use crate::config::GatewayConfig;
use crate::gateway::error::GatewayError;
use crate::gateway::forward::{self, UpstreamTarget};
use crate::gateway::guard::{session_guard, SessionIdentity};
use crate::gateway::{endpoints, identity, rewrite};
use crate::observability::metrics;
use crate::session::SessionStore;

/// Proxy state rebuilt on every configuration (re)load and swapped
/// atomically. In-flight requests keep the snapshot they started with.
pub struct RuntimeState {
    /// Parsed upstream base URL.
    pub target: UpstreamTarget,

    /// Shared upstream client with a bounded connect phase.
    pub client: Client<HttpConnector, Body>,

    /// Budget for the upstream response head.
    pub request_timeout: Duration,

    /// Cap on buffered HTML bodies in the rewriter.
    pub rewrite_buffer_max_bytes: usize,
}

impl RuntimeState {
    fn from_config(config: &GatewayConfig, target: UpstreamTarget) -> Self {
        Self {
            target,
            client: forward::build_client(Duration::from_millis(
                config.gateway.connect_timeout_ms,
            )),
            request_timeout: Duration::from_millis(config.gateway.request_timeout_ms),
            rewrite_buffer_max_bytes: config.gateway.rewrite_buffer_max_bytes,
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// The Session Oracle.
    pub store: Arc<dyn SessionStore>,

    /// Cookie carrying the session token.
    pub cookie_name: String,

    /// Budget for the best-effort session touch.
    pub touch_timeout: Duration,

    /// Path prefix the proxy is mounted under. Fixed for the process
    /// lifetime; changing it requires a restart.
    pub mount_path: String,

    /// Hot-swappable proxy runtime (upstream target, client, timeouts).
    pub runtime: Arc<ArcSwap<RuntimeState>>,
}

/// HTTP server for the session gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    state: Option<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Without a configured upstream URL the gateway routes are disabled
    /// entirely and only the 404 fallback is served.
    pub fn new(config: GatewayConfig, store: Arc<dyn SessionStore>) -> Self {
        let state = match &config.gateway.upstream_url {
            Some(url) => match UpstreamTarget::parse(url) {
                Ok(target) => {
                    tracing::info!(upstream = %url, mount_path = %config.gateway.mount_path, "Gateway initialized");
                    Some(AppState {
                        store,
                        cookie_name: config.session.cookie_name.clone(),
                        touch_timeout: Duration::from_millis(config.session.touch_timeout_ms),
                        mount_path: config.gateway.mount_path.clone(),
                        runtime: Arc::new(ArcSwap::from_pointee(RuntimeState::from_config(
                            &config, target,
                        ))),
                    })
                }
                Err(e) => {
                    tracing::error!(error = %e, "Invalid upstream URL; gateway routes disabled");
                    None
                }
            },
            None => {
                tracing::warn!(
                    "No upstream URL configured (SECOND_APP_URL). Gateway routes disabled."
                );
                None
            }
        };

        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: Option<AppState>) -> Router {
        let router = match state {
            Some(state) => {
                let guard = middleware::from_fn_with_state(state.clone(), session_guard);
                let mount = state.mount_path.clone();

                let proxy_routes = Router::new()
                    .route(&mount, any(proxy_handler))
                    .route(&format!("{mount}/"), any(proxy_handler))
                    .route(&format!("{mount}/{{*path}}"), any(proxy_handler))
                    .route_layer(guard.clone());

                let gateway_routes = Router::new()
                    .route("/gateway/health", get(endpoints::health))
                    .route(
                        "/gateway/session-info",
                        get(endpoints::session_info).layer(guard),
                    )
                    .route("/gateway/logout", get(endpoints::logout));

                Router::new()
                    .merge(proxy_routes)
                    .merge(gateway_routes)
                    .with_state(state)
            }
            None => Router::new(),
        };

        let mut router = router
            .fallback(endpoints::not_found)
            .layer(SetResponseHeaderLayer::if_not_present(
                header::VIA,
                HeaderValue::from_static("1.1 session-gateway"),
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(GlobalConcurrencyLimitLayer::new(
                config.listener.max_connections,
            ));

        if let Some(max_body) = config.security.max_body_bytes {
            router = router.layer(RequestBodyLimitLayer::new(max_body));
        }

        router
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Watcher updates arriving on `config_updates` are applied by swapping
    /// the runtime state; the shutdown receiver triggers a graceful stop.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        // Apply configuration reloads for the lifetime of the server.
        match self.state.clone() {
            Some(state) => {
                let baseline = self.config.clone();
                tokio::spawn(async move {
                    while let Some(new_config) = config_updates.recv().await {
                        Self::apply_reload(&state, &baseline, new_config);
                    }
                });
            }
            None => {
                tokio::spawn(async move {
                    while config_updates.recv().await.is_some() {
                        tracing::warn!(
                            "Gateway routes are disabled; restart required to apply configuration changes"
                        );
                    }
                });
            }
        }

        if let Some(tls) = self.config.listener.tls.clone() {
            let tls_config = crate::net::tls::load_tls_config(
                std::path::Path::new(&tls.cert_path),
                std::path::Path::new(&tls.key_path),
            )
            .await?;

            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                let _ = shutdown.recv().await;
                shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
            });

            axum_server::from_tcp_rustls(listener.into_std()?, tls_config)
                .handle(handle)
                .serve(self.router.into_make_service())
                .await?;
        } else {
            axum::serve(listener, self.router.into_make_service())
                .with_graceful_shutdown(async move {
                    let _ = shutdown.recv().await;
                    tracing::info!("Shutdown signal received");
                })
                .await?;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Swap the proxy runtime for a validated new configuration.
    ///
    /// Only the upstream target, proxy timeouts, and rewrite buffer apply
    /// live; listener, mount path, and session settings need a restart.
    fn apply_reload(state: &AppState, baseline: &GatewayConfig, new_config: GatewayConfig) {
        if let Err(errors) = validate_config(&new_config) {
            for error in &errors {
                tracing::error!(%error, "Rejected reloaded configuration");
            }
            return;
        }

        if new_config.listener.bind_address != baseline.listener.bind_address
            || new_config.gateway.mount_path != baseline.gateway.mount_path
            || new_config.session.cookie_name != baseline.session.cookie_name
        {
            tracing::warn!(
                "Listener, mount path, or session changes detected; restart required to apply them"
            );
        }

        let Some(url) = &new_config.gateway.upstream_url else {
            tracing::warn!("Upstream URL removed; restart required to disable gateway routes");
            return;
        };

        match UpstreamTarget::parse(url) {
            Ok(target) => {
                state
                    .runtime
                    .store(Arc::new(RuntimeState::from_config(&new_config, target)));
                tracing::info!(upstream = %url, "Gateway runtime reloaded");
            }
            Err(e) => {
                tracing::error!(error = %e, "Reloaded upstream URL is invalid; keeping current target");
            }
        }
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Main proxy handler: propagate identity, touch, forward, rewrite.
///
/// The access guard has already validated the session and attached the
/// identity to the request extensions.
async fn proxy_handler(State(state): State<AppState>, mut request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    let Some(identity) = request.extensions().get::<SessionIdentity>().cloned() else {
        // The guard runs ahead of this handler on every registered route.
        return GatewayError::Unauthorized.into_response();
    };

    identity::propagate_identity(request.headers_mut(), &identity);
    identity::touch_session(&state.store, &identity.token, state.touch_timeout).await;

    let runtime = state.runtime.load_full();

    match forward::forward(
        &runtime.client,
        &runtime.target,
        runtime.request_timeout,
        &state.mount_path,
        request,
    )
    .await
    {
        Ok(upstream_response) => {
            let status = upstream_response.status().as_u16();
            let response = rewrite::apply_rewrite(
                upstream_response,
                &state.mount_path,
                runtime.rewrite_buffer_max_bytes,
            )
            .await;
            metrics::record_request(&method, status, "forwarded", start);
            response
        }
        Err(e) => {
            metrics::record_upstream_failure(e.kind());
            metrics::record_request(&method, 502, "upstream_error", start);
            e.into_response()
        }
    }
}
