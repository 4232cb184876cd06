use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::Serialize;

use crate::{EngineError, FinanceSettings, ResultEngine};

mod commissions;
mod distributors;
mod hooks;
mod ledger;
mod withdrawals;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = $tx.rollback().await {
                    tracing::warn!("rollback failed after {err}: {rollback_err}");
                }
                Err(err)
            }
        }
    }};
}

pub(crate) use with_tx;

#[derive(Clone, Debug)]
pub struct Engine {
    database: DatabaseConnection,
    settings: FinanceSettings,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn settings(&self) -> &FinanceSettings {
        &self.settings
    }

    /// Opens a unit of work for the `*_in` operations.
    ///
    /// Nothing is visible to other connections until the caller commits;
    /// dropping the transaction rolls everything back.
    pub async fn begin(&self) -> ResultEngine<DatabaseTransaction> {
        Ok(self.database.begin().await?)
    }
}

/// Result of a best-effort batch: each id ran in its own unit of work.
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<i64>,
    #[serde(serialize_with = "serialize_failures")]
    pub failed: Vec<(i64, EngineError)>,
}

impl BatchOutcome {
    pub(crate) fn record<T>(&mut self, id: i64, result: ResultEngine<T>) {
        match result {
            Ok(_) => self.succeeded.push(id),
            Err(err) => {
                tracing::warn!("batch item {id} failed: {err}");
                self.failed.push((id, err));
            }
        }
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

fn serialize_failures<S>(failed: &[(i64, EngineError)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;

    let mut seq = serializer.serialize_seq(Some(failed.len()))?;
    for (id, err) in failed {
        seq.serialize_element(&(id, err.to_string()))?;
    }
    seq.end()
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    settings: FinanceSettings,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Override the default finance settings.
    pub fn settings(mut self, settings: FinanceSettings) -> EngineBuilder {
        self.settings = settings;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        self.settings.validate()?;
        Ok(Engine {
            database: self.database,
            settings: self.settings,
        })
    }
}
