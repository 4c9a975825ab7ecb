//! Application state, router and server lifecycle.

use axum::{
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
    Router,
};
use clinic_core::error::AppError;
use clinic_core::middleware::{
    create_ip_rate_limiter, ip_rate_limit_middleware, metrics_middleware, request_id_middleware,
    security_headers_middleware, IpRateLimiter, REQUEST_ID_HEADER,
};
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ClinicConfig;
use crate::handlers::{self, health_check, metrics_handler, readiness_check};
use crate::middleware::auth_middleware;
use crate::services::metrics::init_metrics;
use crate::services::{Database, JwtService};
use crate::utils::{hash_password, Password};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ClinicConfig>,
    pub db: Database,
    pub jwt: JwtService,
    pub login_rate_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(config: ClinicConfig, db: Database) -> Self {
        let jwt = JwtService::new(&config.jwt);
        let login_rate_limiter = create_ip_rate_limiter(
            config.security.login_attempts,
            config.security.login_window_seconds,
        );

        Self {
            config: Arc::new(config),
            db,
            jwt,
            login_rate_limiter,
        }
    }
}

fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/auth/me",
            get(handlers::auth::get_me).patch(handlers::auth::update_me),
        )
        .route(
            "/api/staff",
            get(handlers::staff::list_staff).post(handlers::staff::create_staff),
        )
        .route(
            "/api/staff/:id",
            get(handlers::staff::get_staff)
                .put(handlers::staff::update_staff)
                .delete(handlers::staff::deactivate_staff),
        )
        .route(
            "/api/patients",
            get(handlers::patients::list_patients).post(handlers::patients::create_patient),
        )
        .route(
            "/api/patients/:id",
            get(handlers::patients::get_patient)
                .put(handlers::patients::update_patient)
                .delete(handlers::patients::delete_patient),
        )
        .route(
            "/api/patients/:id/history",
            get(handlers::patients::get_patient_history),
        )
        .route(
            "/api/appointments",
            get(handlers::appointments::list_appointments)
                .post(handlers::appointments::create_appointment),
        )
        .route(
            "/api/appointments/:id",
            get(handlers::appointments::get_appointment)
                .put(handlers::appointments::update_appointment)
                .delete(handlers::appointments::delete_appointment),
        )
        .route(
            "/api/appointments/:id/status",
            patch(handlers::appointments::update_appointment_status),
        )
        .route(
            "/api/treatments",
            get(handlers::treatments::list_treatments).post(handlers::treatments::create_treatment),
        )
        .route(
            "/api/treatments/:id",
            get(handlers::treatments::get_treatment)
                .put(handlers::treatments::update_treatment)
                .delete(handlers::treatments::delete_treatment),
        )
        .route(
            "/api/invoices",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route(
            "/api/invoices/:id",
            get(handlers::invoices::get_invoice)
                .put(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        )
        .route(
            "/api/invoices/:id/payments",
            post(handlers::invoices::record_payment),
        )
        .route(
            "/api/invoices/:id/payments/:payment_id",
            delete(handlers::invoices::delete_payment),
        )
        .route(
            "/api/inventory",
            get(handlers::inventory::list_inventory)
                .post(handlers::inventory::create_inventory_item),
        )
        .route(
            "/api/inventory/:id",
            get(handlers::inventory::get_inventory_item)
                .put(handlers::inventory::update_inventory_item)
                .delete(handlers::inventory::delete_inventory_item),
        )
        .route(
            "/api/inventory/:id/adjust",
            post(handlers::inventory::adjust_stock),
        )
        .route("/api/dashboard", get(handlers::dashboard::get_dashboard))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

pub fn build_router(state: AppState) -> Router {
    let login_route = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .merge(login_route)
        .merge(api_routes(&state))
        .with_state(state.clone())
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    staff_id = tracing::field::Empty,
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Connect, migrate when configured, create the bootstrap admin and bind the listener.
    pub async fn build(config: ClinicConfig) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if config.database.run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        if let Some(admin) = &config.bootstrap_admin {
            let hash = hash_password(&Password::new(admin.password.expose_secret().as_str()))?;
            db.bootstrap_admin(&admin.email, &hash).await?;
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Clinic service listener bound");

        Ok(Self {
            port,
            listener,
            state: AppState::new(config, db),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until the listener fails or the future is dropped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(port = self.port, "Clinic service HTTP server starting");

        axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }
}
