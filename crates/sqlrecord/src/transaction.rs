//! Scoped transaction used while cascading related records.
//!
//! The guard begins a transaction on construction and must be finished with
//! [`ImplicitTransaction::commit`] or [`ImplicitTransaction::rollback`]. If it
//! is dropped unfinished (an early return, a `?` on a fatal error) it rolls
//! back, so a save never leaves a half-written cascade behind.

use std::sync::Arc;

use sqlrecord_core::{Connection, Result};

pub struct ImplicitTransaction {
    connection: Arc<dyn Connection>,
    finished: bool,
}

impl ImplicitTransaction {
    /// Begin a transaction on `connection`.
    pub fn begin(connection: Arc<dyn Connection>) -> Result<Self> {
        tracing::info!("Beginning implicit transaction");
        connection.begin()?;
        Ok(Self {
            connection,
            finished: false,
        })
    }

    pub fn commit(mut self) -> Result<()> {
        tracing::info!("Committing implicit transaction");
        self.finished = true;
        self.connection.commit()
    }

    pub fn rollback(mut self) -> Result<()> {
        tracing::info!("Rolling back implicit transaction");
        self.finished = true;
        self.connection.rollback()
    }
}

impl Drop for ImplicitTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::info!("Rolling back unfinished implicit transaction");
        if let Err(e) = self.connection.rollback() {
            tracing::warn!(error = %e, "Rollback of implicit transaction failed");
        }
    }
}

impl std::fmt::Debug for ImplicitTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImplicitTransaction")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
