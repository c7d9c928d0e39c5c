use clap::Parser;
use fixtures::{
    provider::{router, ProviderBehavior, StubProvider},
    run_server, FixtureArgs,
};
use tracing::info;

/// OpenID Provider fixture server
#[derive(Parser, Debug)]
#[clap(name = "op-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,

    /// Client id the provider accepts
    #[arg(long, default_value = "oidc-relay")]
    client_id: String,

    /// Require this client secret at the token endpoint
    #[arg(long)]
    client_secret: Option<String>,

    /// Answer the discovery endpoint with 404
    #[arg(long)]
    no_discovery: bool,

    /// Answer the userinfo endpoint with 500
    #[arg(long)]
    fail_userinfo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let behavior = ProviderBehavior {
        discovery: !args.no_discovery,
        client_id: args.client_id,
        client_secret: args.client_secret,
        userinfo_status: args.fail_userinfo.then_some(500),
        ..Default::default()
    };

    let provider = StubProvider::new(args.common.public_url(), behavior);
    info!("OP fixture advertising itself as {}", provider.base_url());

    run_server(args.common, router(provider)).await
}
