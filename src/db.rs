use crate::config::AppConfig;
use crate::entities;
use sea_orm::{
    sea_query::TableCreateStatement, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DbErr, EntityTrait, Schema,
};
use std::time::Duration;
use tracing::{debug, info};

pub type DbPool = DatabaseConnection;

/// Connection-pool tuning.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            ..Default::default()
        }
    }
}

/// Opens a pool with default tuning.
pub async fn establish_connection(database_url: &str) -> Result<DbPool, DbErr> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };
    establish_connection_with_config(&config).await
}

/// Opens a pool with explicit tuning.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, DbErr> {
    debug!("Opening database pool: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    let pool = Database::connect(opt).await?;
    info!("Database pool ready");
    Ok(pool)
}

/// Opens a pool from the application configuration.
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Creates every table the service needs if it does not already exist.
/// Schema is derived from the entity definitions, so entities are the single
/// source of truth for the data model.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    info!("Ensuring database schema");

    create_table(db, entities::Customer).await?;
    create_table(db, entities::Product).await?;
    create_table(db, entities::Cart).await?;
    create_table(db, entities::CartItem).await?;
    create_table(db, entities::Coupon).await?;
    create_table(db, entities::CartCoupon).await?;
    create_table(db, entities::Order).await?;
    create_table(db, entities::OrderItem).await?;
    create_table(db, entities::TaxConfig).await?;
    create_table(db, entities::WebhookEvent).await?;

    info!("Database schema ready");
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut stmt: TableCreateStatement = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

/// Pings the database; used by the health endpoint.
pub async fn check_connection(pool: &DbPool) -> Result<(), DbErr> {
    pool.ping().await
}
