use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use storefront_api::{
    auth::{self, Role},
    config::{AppConfig, PaymentConfig},
    db::{self, DbConfig},
    entities::{
        cart_item, coupon, customer, product, tax_config, CouponModel, CustomerModel, ProductModel,
    },
    errors::ServiceError,
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        notifications::{LoggingTransport, OrderNotifier},
        payments::{CreateSessionRequest, PaymentGateway, PaymentSession},
    },
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration_test_jwt_secret_0123456789abcdef";
pub const WEBHOOK_SECRET: &str = "whsec_integration_test_secret";

/// Gateway double: records session requests and hands out predictable
/// session ids. Flip `fail` to simulate an unreachable provider.
pub struct TestGateway {
    pub requests: Mutex<Vec<CreateSessionRequest>>,
    pub fail: AtomicBool,
    counter: AtomicU32,
}

impl TestGateway {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            counter: AtomicU32::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn fail_next_calls(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn session_count(&self) -> usize {
        self.requests.lock().expect("gateway mutex poisoned").len()
    }
}

#[async_trait]
impl PaymentGateway for TestGateway {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<PaymentSession, ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::ExternalServiceError(
                "Payment provider unreachable: connection refused".into(),
            ));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests
            .lock()
            .expect("gateway mutex poisoned")
            .push(request);
        Ok(PaymentSession {
            id: format!("cs_test_{}", n),
            url: format!("https://pay.example.com/cs_test_{}", n),
            expires_at: None,
        })
    }
}

/// In-process application backed by an in-memory SQLite database. One
/// connection keeps the whole test on a single database instance.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<TestGateway>,
    _event_task: tokio::task::JoinHandle<()>,
    _notifier_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_cfg = DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("failed to open test database");
        db::ensure_schema(&pool)
            .await
            .expect("failed to create test schema");
        let db = Arc::new(pool);

        let cfg = test_config();

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let (notifier, confirmation_rx) = OrderNotifier::channel(16);
        let notifier_task = tokio::spawn(storefront_api::services::notifications::run_worker(
            confirmation_rx,
            Arc::new(LoggingTransport),
        ));

        let gateway = Arc::new(TestGateway::new());

        let services = AppServices::new(
            db.clone(),
            event_sender.clone(),
            gateway.clone(),
            notifier,
            cfg.payment.clone(),
        );

        let state = AppState {
            db,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            gateway,
            _event_task: event_task,
            _notifier_task: notifier_task,
        }
    }

    pub fn customer_token(&self, customer_id: Uuid) -> String {
        auth::issue_token(
            JWT_SECRET,
            customer_id,
            Role::User,
            chrono::Duration::hours(1),
        )
        .expect("issue customer token")
    }

    #[allow(dead_code)]
    pub fn admin_token(&self) -> String {
        auth::issue_token(
            JWT_SECRET,
            Uuid::new_v4(),
            Role::Admin,
            chrono::Duration::hours(1),
        )
        .expect("issue admin token")
    }

    /// Send a request with an optional JSON body and bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send raw bytes with arbitrary headers. Used by the webhook tests where
    /// the signature covers the exact body bytes.
    #[allow(dead_code)]
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        body: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(body)).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    // Seeding

    pub async fn seed_customer(
        &self,
        name: &str,
        email: &str,
        address: Option<&str>,
    ) -> CustomerModel {
        customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            address: Set(address.map(str::to_string)),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed customer")
    }

    pub async fn seed_product(
        &self,
        title: &str,
        price: Decimal,
        price_after_discount: Decimal,
        quantity: i32,
    ) -> ProductModel {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            description: Set(format!("{} (seeded for tests)", title)),
            image_cover: Set(None),
            price: Set(price),
            price_after_discount: Set(price_after_discount),
            quantity: Set(quantity),
            sold: Set(0),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    #[allow(dead_code)]
    pub async fn seed_coupon(
        &self,
        name: &str,
        discount: Decimal,
        expires_at: DateTime<Utc>,
    ) -> CouponModel {
        coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            discount: Set(discount),
            expires_at: Set(expires_at),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed coupon")
    }

    #[allow(dead_code)]
    pub async fn set_tax_rates(&self, tax_price: Decimal, shipping_price: Decimal) {
        tax_config::ActiveModel {
            id: Set(tax_config::SINGLETON_ID),
            tax_price: Set(tax_price),
            shipping_price: Set(shipping_price),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed tax config");
    }

    // Direct reads for assertions

    #[allow(dead_code)]
    pub async fn product(&self, id: Uuid) -> ProductModel {
        use sea_orm::EntityTrait;
        storefront_api::entities::Product::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("load product")
            .expect("product exists")
    }

    #[allow(dead_code)]
    pub async fn cart_items(&self, cart_id: Uuid) -> Vec<storefront_api::entities::CartItemModel> {
        use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
        storefront_api::entities::CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(&*self.state.db)
            .await
            .expect("load cart items")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
        self._notifier_task.abort();
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt_secret: JWT_SECRET.into(),
        host: "127.0.0.1".into(),
        port: 18080,
        environment: "test".into(),
        log_level: "debug".into(),
        log_json: false,
        auto_migrate: true,
        event_channel_capacity: 64,
        notification_queue_capacity: 16,
        payment: PaymentConfig {
            gateway_url: "http://gateway.invalid".into(),
            gateway_api_key: "sk_test_key".into(),
            webhook_secret: WEBHOOK_SECRET.into(),
            webhook_tolerance_secs: 300,
            gateway_timeout_secs: 2,
            success_url: "http://localhost:3000/orders".into(),
            cancel_url: "http://localhost:3000/cart".into(),
        },
    }
}

/// Parse the response body as JSON.
pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

/// Money fields serialize as strings; accept a bare number too.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a decimal value: {}", other),
    }
}
