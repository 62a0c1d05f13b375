use clap::Parser;
use dotenvy::dotenv;
use returns_backend::infrastructure::database;
use returns_backend::services::staff::ensure_staff_account;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Creates a staff account, or promotes an existing account to staff.
/// Registration through the API can never grant these flags; this binary
/// is the only path.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Username for the staff account
    #[arg(long)]
    username: String,

    /// Password; ignored when promoting an existing account
    #[arg(long)]
    password: Option<String>,

    /// Email for the staff account
    #[arg(long)]
    email: Option<String>,

    /// Also grant the superuser flag
    #[arg(long, default_value_t = false)]
    superuser: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "create_staff=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🔌 Connecting to database...");
    let db = database::setup_database().await?;

    match ensure_staff_account(
        &db,
        &args.username,
        args.password.as_deref(),
        args.email,
        args.superuser,
    )
    .await
    {
        Ok(user) => {
            info!("✅ '{}' is now staff.", user.username);
            Ok(())
        }
        Err(e) => {
            error!("❌ Failed to create staff account: {}", e);
            std::process::exit(1);
        }
    }
}
