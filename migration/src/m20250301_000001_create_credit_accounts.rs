use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // reserved_credits may exceed total_credits after a degraded (non-atomic)
        // reservation, so only the non-negative bounds are enforced here.
        manager
            .create_table(
                Table::create()
                    .table(CreditAccounts::Table)
                    .if_not_exists()
                    .col(pk_uuid(CreditAccounts::Id))
                    .col(
                        big_integer(CreditAccounts::TotalCredits)
                            .default(0)
                            .check(Expr::col(CreditAccounts::TotalCredits).gte(0)),
                    )
                    .col(
                        big_integer(CreditAccounts::ReservedCredits)
                            .default(0)
                            .check(Expr::col(CreditAccounts::ReservedCredits).gte(0)),
                    )
                    .col(
                        timestamp_with_time_zone(CreditAccounts::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(CreditAccounts::UpdatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE OR REPLACE FUNCTION update_updated_at_column()
                RETURNS TRIGGER AS $$
                BEGIN
                    NEW.updated_at = NOW();
                    RETURN NEW;
                END;
                $$ LANGUAGE plpgsql;
                "#,
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER update_credit_accounts_updated_at
                BEFORE UPDATE ON credit_accounts
                FOR EACH ROW
                EXECUTE FUNCTION update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CreditAccounts::Table).to_owned())
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP FUNCTION IF EXISTS update_updated_at_column() CASCADE;")
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum CreditAccounts {
    Table,
    Id,
    TotalCredits,
    ReservedCredits,
    CreatedAt,
    UpdatedAt,
}
