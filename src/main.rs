use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{routing::get, Router};
use tokio::{signal, sync::mpsc};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::info;

use storefront_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::ensure_schema(&db).await?;
    }
    let db = Arc::new(db);

    // Domain events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));
    tokio::spawn(api::events::process_events(event_rx));

    // Order confirmations: detached queue with a retrying worker
    let (notifier, confirmation_rx) =
        api::services::notifications::OrderNotifier::channel(cfg.notification_queue_capacity);
    tokio::spawn(api::services::notifications::run_worker(
        confirmation_rx,
        Arc::new(api::services::notifications::LoggingTransport),
    ));

    // Payment gateway client
    let gateway: Arc<dyn api::services::payments::PaymentGateway> =
        Arc::new(api::services::payments::HttpPaymentGateway::new(
            &cfg.payment,
        )?);

    let services = api::handlers::AppServices::new(
        db.clone(),
        event_sender.clone(),
        gateway,
        notifier,
        cfg.payment.clone(),
    );

    let app_state = api::AppState {
        db: db.clone(),
        config: cfg.clone(),
        event_sender,
        services,
    };

    let app = Router::<api::AppState>::new()
        .route("/", get(|| async { "storefront-api up" }))
        .route(
            "/health",
            get(|axum::extract::State(state): axum::extract::State<api::AppState>| async move {
                match api::db::check_connection(&state.db).await {
                    Ok(()) => (axum::http::StatusCode::OK, "ok"),
                    Err(_) => (axum::http::StatusCode::SERVICE_UNAVAILABLE, "db unavailable"),
                }
            }),
        )
        .nest("/api/v1", api::api_v1_routes())
        .merge(api::openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!("storefront-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
