use std::env;

use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub github_api_url: String,
    pub github_token: String,
    pub github_webhook_secret: Option<String>,
    pub payment_api_url: String,
    pub payment_api_key: String,
    pub claim_base_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            github_api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            github_token: env::var("GITHUB_TOKEN")?,
            github_webhook_secret: env::var("GITHUB_WEBHOOK_SECRET").ok(),
            payment_api_url: env::var("PAYMENT_API_URL")?,
            payment_api_key: env::var("PAYMENT_API_KEY")?,
            claim_base_url: env::var("CLAIM_BASE_URL")
                .unwrap_or_else(|_| "https://bountyflow.dev/claims".to_string()),
        })
    }
}
