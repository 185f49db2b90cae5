use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bountyflow::config::Config;
use bountyflow::db::postgres::PgStore;
use bountyflow::db::store::Store;
use bountyflow::github::GithubClient;
use bountyflow::payments::HttpPaymentClient;
use bountyflow::{create_app, AppState, Settings};

#[derive(Parser, Debug)]
#[command(name = "bountyflow", about = "Bounty-to-payout pipeline service")]
struct Cli {
    /// Override the configured server port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = bountyflow::db::create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations completed");

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let github = Arc::new(GithubClient::new(
        config.github_api_url.clone(),
        config.github_token.clone(),
    ));
    let payments = Arc::new(HttpPaymentClient::new(
        config.payment_api_url.clone(),
        config.payment_api_key.clone(),
    ));

    if config.github_webhook_secret.is_none() {
        tracing::warn!("GITHUB_WEBHOOK_SECRET not set; webhook signature verification disabled");
    }

    let settings = Settings::new(
        config.github_webhook_secret.clone(),
        config.claim_base_url.clone(),
    );
    let state = AppState::new(store, github, payments, settings);
    let app = create_app(state);

    let port = cli.port.unwrap_or(config.server_port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
