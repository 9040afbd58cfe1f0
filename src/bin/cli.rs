use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use uuid::Uuid;

use pagegate::admin::AdminService;
use pagegate::authz::{roles, EffectivePermissionResolver};
use pagegate::config::AppConfig;
use pagegate::db;
use pagegate::identity::{IdentityProvider, LocalIdentityProvider};
use pagegate::jwt::JwtConfig;
use pagegate::store::{SqliteStore, Store};

#[derive(Parser, Debug)]
#[command(author, version, about = "pagegate operator tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account (no role)
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Give an existing account the admin role
    SeedAdmin {
        #[arg(long)]
        email: String,
    },
    /// Print the effective permission mask of a user on a page
    Effective {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        page: String,
    },
    /// Mint a bearer token for local development
    MintToken {
        #[arg(long)]
        user: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Fall back to the crate-local `.env` when the working directory differs.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;
    let jwt = JwtConfig::from_config(&config);

    let pool = db::init(&config.database_url).await?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool.clone()));
    let identity = LocalIdentityProvider::new(pool, jwt.clone());

    match cli.command {
        Commands::CreateUser { email, password } => {
            let account = identity.create_user(&email, &password, true).await?;
            println!("Created account {} ({})", account.id, account.email);
        }
        Commands::SeedAdmin { email } => {
            let account = identity
                .find_user_by_email(&email)
                .await?
                .with_context(|| format!("no account with email {}", email))?;
            let role = store
                .find_role(roles::ADMIN)
                .await?
                .context("admin role missing; the database was not migrated")?;

            let outcome = AdminService::new(Arc::clone(&store)).assign_role(account.id, &role).await?;
            println!("Assigned admin to {} ({} page permissions copied)", account.email, outcome.value);
            for warning in outcome.warnings {
                eprintln!("warning: {}", warning);
            }
        }
        Commands::Effective { user, page } => {
            let mask = EffectivePermissionResolver::new(store).resolve(user, &page).await?;
            println!("{:<10} {:>2} {:?}", page, mask.bits(), mask);
        }
        Commands::MintToken { user } => {
            let email = identity
                .list_users()
                .await?
                .into_iter()
                .find(|account| account.id == user)
                .map(|account| account.email);
            println!("{}", jwt.encode(user, email.as_deref())?);
        }
    }

    Ok(())
}
