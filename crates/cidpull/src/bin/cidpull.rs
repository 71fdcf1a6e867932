//! The binary cidpull.

use cidpull::*;
use cidpull_api::*;
use cidpull_core::factories::GatewayNode;
use cidpull_core::BootstrapPolicy;

#[derive(clap::Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Path to a json run config. Any flags given below override the
    /// values it contains.
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// Path to the repo holding the block cache.
    #[arg(long)]
    pub repo: Option<std::path::PathBuf>,

    /// Url (or file path) to fetch the newline-delimited cid list from.
    #[arg(long)]
    pub cids_url_source: Option<String>,

    /// Json list of bootstrap peers to connect to, for example
    /// `[{"ID":"12D3KooW...","Addrs":["/dns/example.org/tcp/4001"]}]`.
    #[arg(long)]
    pub peers: Option<String>,

    /// Base url of the http gateway blocks are retrieved through.
    #[arg(long)]
    pub gateway: Option<String>,

    /// Fetches allowed in flight at once. Defaults to the cpu count.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Deadline for a single fetch attempt, in seconds.
    #[arg(long)]
    pub fetch_timeout_s: Option<u32>,

    /// Deadline for connecting to a bootstrap peer, in seconds.
    #[arg(long)]
    pub connect_timeout_s: Option<u32>,

    /// How many times a failed fetch is retried.
    #[arg(long)]
    pub retries: Option<usize>,

    /// Keep going when a bootstrap peer cannot be reached, instead of
    /// aborting the run.
    #[arg(long)]
    pub continue_on_unreachable_peer: bool,
}

impl Args {
    /// Build the run config from the optional config file and the flags.
    pub fn into_config(self) -> PullResult<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };

        if let Some(repo) = self.repo {
            config.node.repo = repo;
        }
        if let Some(source) = self.cids_url_source {
            config.cids_source = source;
        }
        if let Some(peers) = self.peers {
            config.peers = peer::parse_peer_list(&peers)?;
        }
        if let Some(gateway) = self.gateway {
            config.node.gateway_url = gateway;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(s) = self.fetch_timeout_s {
            config.fetch.fetch_timeout_ms = s.saturating_mul(1_000);
        }
        if let Some(s) = self.connect_timeout_s {
            config.bootstrap.connect_timeout_ms = s.saturating_mul(1_000);
        }
        if let Some(retries) = self.retries {
            config.fetch.max_retries = retries;
        }
        if self.continue_on_unreachable_peer {
            config.bootstrap.policy = BootstrapPolicy::Continue;
        }

        Ok(config)
    }
}

async fn run(args: Args) -> PullResult<RunReport> {
    let config = args.into_config()?;
    tracing::debug!(?config, "starting run");

    let node = GatewayNode::create(config.gateway_config())?;
    let run = RunOrchestrator::new(config, node);

    let cancel = run.cancel_token();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupted, finishing the current batch");
        cancel.cancel();
    })
    .map_err(|e| PullError::other_src("could not install ctrl-c handler", e))?;

    run.run_from_source().await
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = <Args as clap::Parser>::parse();

    match run(args).await {
        Ok(report) => print!("{report}"),
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
