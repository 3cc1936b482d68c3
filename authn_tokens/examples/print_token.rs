use std::time::Duration;

use authn_tokens::{AsyncTokenProvider, ProviderBuilder, TokenStatus};
use clap::Parser;
use tokio::time;

#[derive(Debug, Parser)]
struct Opts {
    /// The issuer whose OpenID configuration names the token endpoint
    #[arg(short, long, env, conflicts_with = "token_url")]
    issuer_url: Option<String>,

    /// The issuing authority's token request URL
    #[arg(short, long, env)]
    token_url: Option<String>,

    /// The client ID of the client
    #[arg(short, long, env)]
    client_id: String,

    /// The client secret, for confidential clients
    #[arg(short = 's', long, env, hide_env_values = true)]
    client_secret: Option<String>,

    /// The refresh token to exchange
    #[arg(short, long, env, hide_env_values = true)]
    refresh_token: String,

    /// The scope to request
    #[arg(long, env)]
    scope: Option<String>,

    /// Keep polling for a token at this interval, in seconds
    #[arg(short, long)]
    watch: Option<u64>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let mut builder = ProviderBuilder::new(opts.refresh_token, opts.client_id);
    if let Some(issuer_url) = opts.issuer_url {
        builder = builder.issuer_url(issuer_url);
    }
    if let Some(token_url) = opts.token_url {
        builder = builder.token_endpoint_url(token_url);
    }
    if let Some(client_secret) = opts.client_secret {
        builder = builder.client_secret(client_secret);
    }
    if let Some(scope) = opts.scope {
        builder = builder.scope(scope);
    }

    let mut provider = AsyncTokenProvider::new(builder.build()?)?;

    let token = provider.token().await?;
    tracing::info!(
        token = format_args!("{:#?}", token.access_token()),
        expiry = token.expiry().map(|e| e.0),
        "first access token"
    );

    let Some(period) = opts.watch else {
        println!("{}", token.as_str());
        return Ok(());
    };

    let mut interval = time::interval(Duration::from_secs(period));
    loop {
        interval.tick().await;

        let status = provider.container().status();
        let token = provider.token().await?;
        match status {
            TokenStatus::Valid => {
                tracing::debug!(?status, expiry = token.expiry().map(|e| e.0), "pulled token")
            }
            TokenStatus::Stale | TokenStatus::Uninitialized => {
                tracing::info!(?status, expiry = token.expiry().map(|e| e.0), "refreshed token")
            }
        }
    }
}
