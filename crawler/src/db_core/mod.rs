pub mod prelude {
    pub use entity::{analyzed_issue, prelude::*};
    pub use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr};
}

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};

use crate::{
    app_config::DbConfig,
    error::{AppError, AppResult},
};

use prelude::AnalyzedIssue;

/// Open the store and make sure the results table exists
pub async fn connect(cfg: &DbConfig) -> AppResult<DatabaseConnection> {
    let url = cfg.connection_url()?;
    let mut db_options = ConnectOptions::new(url);
    db_options
        .max_connections(cfg.max_connections)
        .sqlx_logging(false);

    let conn = Database::connect(db_options).await.map_err(|e| {
        AppError::Connect(format!("{} store {}: {}", cfg.driver, cfg.database, e))
    })?;

    ensure_schema(&conn)
        .await
        .map_err(|e| AppError::Connect(format!("schema bootstrap failed: {}", e)))?;

    tracing::info!("Connected to {} store {}", cfg.driver, cfg.database);
    Ok(conn)
}

/// Create the `analyzed_issue` table (with its unique key index) if it is missing
pub async fn ensure_schema(conn: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let mut stmt = schema.create_table_from_entity(AnalyzedIssue);
    stmt.if_not_exists();
    conn.execute(backend.build(&stmt)).await?;

    Ok(())
}
