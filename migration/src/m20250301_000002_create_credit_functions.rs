use sea_orm_migration::prelude::*;

/// Installs the store-side atomic primitives used by the reservation service.
///
/// Each function is a single UPDATE guarded by the row lock it takes, and
/// returns whether a row was touched. Databases without this migration still
/// work through the non-atomic fallback path.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION reserve_credits(p_user_id UUID, p_amount BIGINT)
            RETURNS BOOLEAN AS $$
            BEGIN
                UPDATE credit_accounts
                SET reserved_credits = reserved_credits + p_amount
                WHERE id = p_user_id
                  AND reserved_credits + p_amount <= total_credits;
                RETURN FOUND;
            END;
            $$ LANGUAGE plpgsql;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION finalize_credit_usage(
                p_user_id UUID,
                p_reserved_amount BIGINT,
                p_actual_amount BIGINT
            )
            RETURNS BOOLEAN AS $$
            BEGIN
                UPDATE credit_accounts
                SET reserved_credits = GREATEST(reserved_credits - p_reserved_amount, 0),
                    total_credits = GREATEST(total_credits - p_actual_amount, 0)
                WHERE id = p_user_id;
                RETURN FOUND;
            END;
            $$ LANGUAGE plpgsql;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION release_reserved_credits(p_user_id UUID, p_amount BIGINT)
            RETURNS BOOLEAN AS $$
            BEGIN
                UPDATE credit_accounts
                SET reserved_credits = GREATEST(reserved_credits - p_amount, 0)
                WHERE id = p_user_id;
                RETURN FOUND;
            END;
            $$ LANGUAGE plpgsql;
            "#,
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP FUNCTION IF EXISTS reserve_credits(UUID, BIGINT);
                DROP FUNCTION IF EXISTS finalize_credit_usage(UUID, BIGINT, BIGINT);
                DROP FUNCTION IF EXISTS release_reserved_credits(UUID, BIGINT);
                "#,
            )
            .await?;

        Ok(())
    }
}
