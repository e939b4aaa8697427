//! Database connection utilities.

use sea_orm::{Database, DatabaseConnection, DbErr};

/// SQLite pragmas applied on every connection.
///
/// Ingestion writes one row per repository from many concurrent tasks, so
/// WAL and a busy timeout keep those writers from failing on lock contention.
const SQLITE_PRAGMAS: [&str; 3] = [
    "PRAGMA journal_mode=WAL",
    "PRAGMA busy_timeout=5000",
    "PRAGMA synchronous=NORMAL",
];

async fn configure_sqlite(db: &DatabaseConnection) -> Result<(), DbErr> {
    use sea_orm::{ConnectionTrait, Statement};

    for pragma in SQLITE_PRAGMAS {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            pragma.to_string(),
        ))
        .await?;
    }

    Ok(())
}

fn is_sqlite(database_url: &str) -> bool {
    database_url.starts_with("sqlite:")
}

/// Establish a connection to the database.
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    if is_sqlite(database_url) {
        configure_sqlite(&db).await?;
    }

    Ok(db)
}

/// Connect and bring the schema up to date.
///
/// ```ignore
/// let db = tally::connect_and_migrate("sqlite://tally.db?mode=rwc").await?;
/// ```
#[cfg(feature = "migrate")]
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    use sea_orm_migration::MigratorTrait;

    let db = connect(database_url).await?;
    crate::migration::Migrator::up(&db, None).await?;
    Ok(db)
}
