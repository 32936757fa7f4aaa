use async_trait::async_trait;
use entity::credit_accounts;
use sea_orm::{
    entity::*, query::*, sea_query::Expr, sqlx, ConnectionTrait, DatabaseBackend,
    DatabaseConnection, DbErr, RuntimeErr, Statement,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{AccountStore, ReserveOutcome, StoreResult};
use crate::{
    error::StoreError,
    models::credits::{AccountBalance, BalanceUpdate},
};

/// PostgreSQL `undefined_function` SQLSTATE
const UNDEFINED_FUNCTION: &str = "42883";

const RESERVE_FN: &str = "reserve_credits";
const FINALIZE_FN: &str = "finalize_credit_usage";
const RELEASE_FN: &str = "release_reserved_credits";

/// Account store backed by the `credit_accounts` table.
///
/// Atomic primitives are the SQL functions installed by the
/// `create_credit_functions` migration. When they are missing, Postgres
/// rejects the call with `42883` and the call is reported as
/// [`StoreError::Unsupported`]. No other error is ever classified that way.
pub struct PgAccountStore {
    db: DatabaseConnection,
}

impl PgAccountStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Checks `pg_proc` for the reservation functions.
    #[instrument(skip(self))]
    pub async fn probe_atomic_support(&self) -> StoreResult<bool> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "SELECT COUNT(DISTINCT proname) AS installed FROM pg_proc WHERE proname IN ($1, $2, $3)",
                [RESERVE_FN.into(), FINALIZE_FN.into(), RELEASE_FN.into()],
            ))
            .await?;

        let installed: i64 = match row {
            Some(row) => row.try_get("", "installed")?,
            None => 0,
        };

        debug!("Found {} of 3 credit functions installed", installed);
        Ok(installed == 3)
    }

    /// Runs `SELECT <function>(...)` and returns its boolean result.
    async fn call_primitive(
        &self,
        function: &'static str,
        sql: &str,
        values: Vec<sea_orm::Value>,
    ) -> StoreResult<bool> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                sql,
                values,
            ))
            .await
            .map_err(|e| classify_primitive_error(e, function))?;

        match row {
            Some(row) => Ok(row.try_get::<Option<bool>>("", "applied")?.unwrap_or(false)),
            None => Ok(false),
        }
    }
}

/// Maps a missing-function failure to the capability signal, everything else to a database error.
fn classify_primitive_error(err: DbErr, function: &'static str) -> StoreError {
    if is_undefined_function(&err) {
        StoreError::Unsupported(function)
    } else {
        StoreError::Database(err)
    }
}

fn is_undefined_function(err: &DbErr) -> bool {
    match err {
        DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db_err))) => {
            db_err.code().as_deref() == Some(UNDEFINED_FUNCTION)
        }
        _ => false,
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn read_account(&self, user_id: Uuid) -> StoreResult<Option<AccountBalance>> {
        let account = credit_accounts::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?;

        Ok(account.map(AccountBalance::from))
    }

    async fn atomic_reserve(&self, user_id: Uuid, amount: i64) -> StoreResult<ReserveOutcome> {
        let applied = self
            .call_primitive(
                RESERVE_FN,
                "SELECT reserve_credits($1, $2) AS applied",
                vec![user_id.into(), amount.into()],
            )
            .await?;

        Ok(if applied {
            ReserveOutcome::Reserved
        } else {
            // The function cannot tell a missing row from a failed bound check
            ReserveOutcome::Insufficient
        })
    }

    async fn atomic_finalize(
        &self,
        user_id: Uuid,
        reserved_amount: i64,
        actual_amount: i64,
    ) -> StoreResult<()> {
        let applied = self
            .call_primitive(
                FINALIZE_FN,
                "SELECT finalize_credit_usage($1, $2, $3) AS applied",
                vec![user_id.into(), reserved_amount.into(), actual_amount.into()],
            )
            .await?;

        if applied {
            Ok(())
        } else {
            Err(StoreError::AccountMissing(user_id))
        }
    }

    async fn atomic_release(&self, user_id: Uuid, amount: i64) -> StoreResult<()> {
        let applied = self
            .call_primitive(
                RELEASE_FN,
                "SELECT release_reserved_credits($1, $2) AS applied",
                vec![user_id.into(), amount.into()],
            )
            .await?;

        if applied {
            Ok(())
        } else {
            Err(StoreError::AccountMissing(user_id))
        }
    }

    async fn unconditional_update(&self, user_id: Uuid, update: BalanceUpdate) -> StoreResult<()> {
        let mut query = credit_accounts::Entity::update_many()
            .filter(credit_accounts::Column::Id.eq(user_id));

        if let Some(total) = update.total_credits {
            query = query.col_expr(credit_accounts::Column::TotalCredits, Expr::value(total));
        }
        if let Some(reserved) = update.reserved_credits {
            query = query.col_expr(
                credit_accounts::Column::ReservedCredits,
                Expr::value(reserved),
            );
        }
        if update.total_credits.is_none() && update.reserved_credits.is_none() {
            return Ok(());
        }

        let result = query.exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::AccountMissing(user_id));
        }

        Ok(())
    }
}
