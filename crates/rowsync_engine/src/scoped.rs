//! Scoped connections.
//!
//! A [`ScopedConnection`] owns a connection for the duration of one
//! scope-level operation. In [`TransactionMode::WithTransaction`] it opens a
//! transaction on acquire and rolls it back when dropped without an explicit
//! [`ScopedConnection::commit`].

use crate::error::{ErrorContext, SyncError, SyncResult};
use crate::provider::{DbCommand, DbConnection, SyncProvider};
use rowsync_core::{CancellationToken, RowValue};
use std::fmt;

/// Whether a scoped connection runs inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// Every command commits on its own. Nothing is atomic.
    NoTransaction,
    /// All commands run in one transaction.
    #[default]
    WithTransaction,
}

/// The logical stage a connection is acquired for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStage {
    /// Creating database objects.
    Provisioning,
    /// Dropping database objects.
    Deprovisioning,
    /// Applying a batch of changes.
    ChangesApplying,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Provisioning => "provisioning",
            Self::Deprovisioning => "deprovisioning",
            Self::ChangesApplying => "changes applying",
        })
    }
}

/// A connection bound to one stage, with rollback-on-drop semantics.
///
/// Every command goes through the guard so cancellation is checked before
/// each round trip.
pub struct ScopedConnection<C: DbConnection> {
    connection: C,
    mode: TransactionMode,
    stage: SyncStage,
    cancellation: CancellationToken,
    in_transaction: bool,
}

impl<C: DbConnection> ScopedConnection<C> {
    /// Opens a connection from `provider` and, if requested, a transaction.
    pub fn acquire<P>(
        provider: &P,
        mode: TransactionMode,
        stage: SyncStage,
        cancellation: &CancellationToken,
    ) -> SyncResult<Self>
    where
        P: SyncProvider<Connection = C>,
    {
        let connection = provider
            .connect()
            .map_err(|e| SyncError::execution(ErrorContext::default(), e))?;
        Self::open(connection, mode, stage, cancellation)
    }

    /// Wraps an already opened connection.
    pub fn open(
        connection: C,
        mode: TransactionMode,
        stage: SyncStage,
        cancellation: &CancellationToken,
    ) -> SyncResult<Self> {
        let mut scoped = Self {
            connection,
            mode,
            stage,
            cancellation: cancellation.clone(),
            in_transaction: false,
        };
        scoped.check_cancelled()?;

        if mode == TransactionMode::WithTransaction {
            scoped
                .connection
                .begin_transaction()
                .map_err(|e| SyncError::execution(ErrorContext::default(), e))?;
            scoped.in_transaction = true;
        }
        tracing::debug!(%stage, ?mode, "connection acquired");
        Ok(scoped)
    }

    /// Returns the underlying connection.
    pub fn connection(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Returns the transaction mode.
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Returns the stage this connection was acquired for.
    pub fn stage(&self) -> SyncStage {
        self.stage
    }

    /// Returns the cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns true while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Fails with `Cancelled` if the token was cancelled.
    pub fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancellation.is_cancelled() {
            Err(SyncError::Cancelled { stage: self.stage })
        } else {
            Ok(())
        }
    }

    /// Executes a command and returns the number of affected rows.
    pub fn execute_non_query(&mut self, command: &DbCommand) -> SyncResult<u64> {
        self.check_cancelled()?;
        tracing::debug!(command = %command, "execute");
        self.connection
            .execute_non_query(command)
            .map_err(|e| SyncError::execution(ErrorContext::default(), e))
    }

    /// Executes a scalar command.
    pub fn execute_scalar(&mut self, command: &DbCommand) -> SyncResult<Option<RowValue>> {
        self.check_cancelled()?;
        tracing::debug!(command = %command, "execute scalar");
        self.connection
            .execute_scalar(command)
            .map_err(|e| SyncError::execution(ErrorContext::default(), e))
    }

    /// Commits the transaction. A no-op in `NoTransaction` mode.
    pub fn commit(mut self) -> SyncResult<()> {
        self.check_cancelled()?;
        if self.in_transaction {
            self.connection
                .commit()
                .map_err(|e| SyncError::execution(ErrorContext::default(), e))?;
            self.in_transaction = false;
            tracing::debug!(stage = %self.stage, "transaction committed");
        }
        Ok(())
    }
}

impl<C: DbConnection> Drop for ScopedConnection<C> {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        match self.connection.rollback() {
            Ok(()) => tracing::debug!(stage = %self.stage, "transaction rolled back"),
            Err(e) => tracing::warn!(stage = %self.stage, error = %e, "rollback failed"),
        }
    }
}
