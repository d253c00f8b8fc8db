//! SQL executor
//!
//! Statements go to a [`StatementSink`]: either the database ([`SqlExecutor`])
//! or a writer ([`SqlPrinter`]) when only printing the plan.

use async_trait::async_trait;
use std::io::Write;

use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};

/// Destination for the ordered statement stream
#[async_trait]
pub trait StatementSink: Send {
    async fn apply(&mut self, statement: &str) -> Result<()>;
}

/// SQL executor for running statements against the live database
pub struct SqlExecutor {
    connection: DatabaseConnection,
}

impl SqlExecutor {
    /// Create a new SQL executor
    pub fn new(connection: DatabaseConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl StatementSink for SqlExecutor {
    async fn apply(&mut self, statement: &str) -> Result<()> {
        self.connection.execute(statement).await
    }
}

/// Writes one statement per line instead of executing
pub struct SqlPrinter<W: Write + Send> {
    writer: W,
}

impl SqlPrinter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> SqlPrinter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: Write + Send> StatementSink for SqlPrinter<W> {
    async fn apply(&mut self, statement: &str) -> Result<()> {
        writeln!(self.writer, "{}", statement)?;
        Ok(())
    }
}

/// Send statements in order, stopping at the first failure.
///
/// Statements already applied stay applied. Returns how many were sent.
pub async fn execute_batch<S>(sink: &mut S, statements: &[String]) -> Result<usize>
where
    S: StatementSink + ?Sized,
{
    for (i, statement) in statements.iter().enumerate() {
        tracing::debug!(statement_number = i + 1, sql = %statement, "Applying statement");
        if let Err(e) = sink.apply(statement).await {
            tracing::error!(statement_number = i + 1, sql = %statement, error = %e, "Statement failed");
            return Err(Error::MigrationError {
                index: i + 1,
                statement: statement.clone(),
                message: e.to_string(),
            });
        }
    }
    Ok(statements.len())
}
