//! Schema reconciler: converges a live MySQL schema to a declarative TOML document
//!
//! The desired schema is declared as `[[tables]]` blocks. A run introspects the
//! live database, computes the difference, renders it as DDL and either applies
//! the statements in order or prints them.

pub mod config;
pub mod db;
pub mod error;
pub mod schema;
pub mod utils;

// Re-export main types for easier access
pub use config::{ConnectionProfile, LoadedConfig, LoggingConfig};
pub use db::connection::DatabaseConnection;
pub use db::executor::{execute_batch, SqlExecutor, SqlPrinter, StatementSink};
pub use error::{Error, Result};
pub use schema::analyzer::{Analyzer, Introspection, SchemaAnalyzer};
pub use schema::diff::SchemaDiff;
pub use schema::export::export_schema;
pub use schema::generator::generate_migration_sql;
pub use schema::types::DatabaseSchema;

/// Load the document and connect with the selected profile
pub async fn init(
    config_path: &str,
    env: Option<&str>,
    connection_path: Option<&str>,
) -> Result<Reconciler> {
    let config = config::load_from_file(config_path, env, connection_path)?;
    Reconciler::new(config).await
}

/// Introspect, diff against `desired`, and send the resulting statements to `sink`.
///
/// Returns the statements that were sent. With `strict`, any skipped metadata
/// row fails the run before anything is sent.
pub async fn reconcile<A, S>(
    analyzer: &A,
    schema_name: &str,
    desired: &DatabaseSchema,
    strict: bool,
    sink: &mut S,
) -> Result<Vec<String>>
where
    A: Analyzer + ?Sized,
    S: StatementSink + ?Sized,
{
    let diff = plan(analyzer, schema_name, desired, strict).await?;
    if diff.is_empty() {
        tracing::info!(schema = schema_name, "Database schema is already in sync");
        return Ok(Vec::new());
    }

    let statements = generate_migration_sql(&diff);
    tracing::info!(schema = schema_name, statements = statements.len(), "Applying changes");
    execute_batch(sink, &statements).await?;
    Ok(statements)
}

/// Introspect and diff without producing any statements
pub async fn plan<A>(
    analyzer: &A,
    schema_name: &str,
    desired: &DatabaseSchema,
    strict: bool,
) -> Result<SchemaDiff>
where
    A: Analyzer + ?Sized,
{
    let introspection = analyzer.analyze_schema(schema_name).await?;
    let live = if strict {
        introspection.into_strict()?
    } else {
        introspection.into_lenient()
    };
    Ok(SchemaDiff::generate(&live, desired))
}

/// The main client for one reconciliation run
pub struct Reconciler {
    config: LoadedConfig,
    db_connection: DatabaseConnection,
    schema_analyzer: SchemaAnalyzer,
}

impl Reconciler {
    /// Create a new client, connecting with the loaded profile
    pub async fn new(config: LoadedConfig) -> Result<Self> {
        let db_connection = DatabaseConnection::connect(&config.profile).await?;
        let schema_analyzer = SchemaAnalyzer::new(db_connection.clone());

        Ok(Self {
            config,
            db_connection,
            schema_analyzer,
        })
    }

    /// Analyze the current database schema
    pub async fn analyze_database_schema(&self, strict: bool) -> Result<DatabaseSchema> {
        let introspection = self
            .schema_analyzer
            .analyze(self.db_connection.database())
            .await?;
        if strict {
            introspection.into_strict()
        } else {
            Ok(introspection.into_lenient())
        }
    }

    /// Generate a schema diff between the document and the database
    pub async fn generate_schema_diff(&self, strict: bool) -> Result<SchemaDiff> {
        plan(
            &self.schema_analyzer,
            self.db_connection.database(),
            &self.config.schema,
            strict,
        )
        .await
    }

    /// Complete workflow: analyze db, generate and apply migrations
    pub async fn sync_database(&self, sql_only: bool, strict: bool) -> Result<Vec<String>> {
        let schema_name = self.db_connection.database();
        if sql_only {
            let mut printer = SqlPrinter::stdout();
            reconcile(&self.schema_analyzer, schema_name, &self.config.schema, strict, &mut printer)
                .await
        } else {
            let mut executor = SqlExecutor::new(self.db_connection.clone());
            reconcile(&self.schema_analyzer, schema_name, &self.config.schema, strict, &mut executor)
                .await
        }
    }

    /// Close the underlying connection
    pub async fn close(self) {
        self.db_connection.close().await;
    }
}
