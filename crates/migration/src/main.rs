use sea_orm::Database;
use sea_orm_migration::prelude::*;

/// Same file the admin CLI opens by default.
const DEFAULT_DATABASE_URL: &str = "sqlite:./ledger.db?mode=rwc";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut args = std::env::args().skip(1);
    let cmd = args.next().unwrap_or_else(|| "up".to_string());

    let db_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    let db = Database::connect(&db_url).await?;

    match cmd.as_str() {
        "up" => migration::Migrator::up(&db, None).await?,
        "down" => migration::Migrator::down(&db, None).await?,
        "fresh" => migration::Migrator::fresh(&db).await?,
        "status" => {
            migration::Migrator::status(&db).await?;
        }
        other => {
            eprintln!("unknown command `{other}`");
            eprintln!("usage: migration [up|down|fresh|status]");
            eprintln!("applies the ledger schema to $DATABASE_URL (default {DEFAULT_DATABASE_URL})");
            std::process::exit(2);
        }
    }

    Ok(())
}
