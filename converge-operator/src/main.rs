//! converge-operator: keeps declared project integrations in line with the
//! cloud management API.
//!
//! The operator watches a directory of JSON manifests and:
//! - Links and authorizes cloud provider access roles for projects
//! - Creates and deletes data federation private endpoints
//! - Pushes federated authentication settings for the organization
//! - Writes conditions and per-item status back into each manifest

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use converge_engine::HttpClient;
use converge_operator::{FileStore, Operator, OperatorConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Converge operator
#[derive(Parser, Debug)]
#[command(name = "converge-operator", version, about)]
struct Args {
    /// Management API base URL
    #[arg(long, env = "CONVERGE_API_BASE_URL", default_value = "https://cloud.mongodb.com")]
    api_base_url: String,

    /// Bearer token for the management API
    #[arg(long, env = "CONVERGE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Organization that federated auth manifests apply to
    #[arg(long, env = "CONVERGE_ORG_ID")]
    org_id: Option<String>,

    /// Directory holding the resource manifests
    #[arg(long, env = "CONVERGE_MANIFEST_DIR", default_value = "/var/lib/converge/manifests")]
    manifest_dir: PathBuf,

    /// Resync interval for converged resources in seconds
    #[arg(long, default_value = "30")]
    resync_interval: u64,

    /// Management API request timeout in seconds
    #[arg(long, default_value = "30")]
    request_timeout: u64,

    /// Refuse to overwrite top-level objects the operator does not own
    #[arg(long)]
    object_deletion_protection: bool,

    /// Refuse to remove sub-resources the operator did not create
    #[arg(long)]
    subobject_deletion_protection: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "converge_operator=info,converge_engine=info,reqwest=warn,hyper=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());

    info!("Starting converge-operator on {}", host);
    info!("Management API: {}", args.api_base_url);
    info!("Manifest directory: {}", args.manifest_dir.display());
    if args.api_token.is_none() {
        info!("No API token configured, requests are sent unauthenticated");
    }

    let client = HttpClient::new(
        args.api_base_url,
        args.api_token,
        Duration::from_secs(args.request_timeout),
    )
    .context("Failed to build management API client")?;

    let store = FileStore::new(args.manifest_dir);
    store
        .ensure_dir()
        .await
        .context("Failed to prepare manifest directory")?;

    let mut operator = Operator::new(
        store,
        Arc::new(client),
        OperatorConfig {
            org_id: args.org_id,
            resync_interval: Duration::from_secs(args.resync_interval),
            object_deletion_protection: args.object_deletion_protection,
            subobject_deletion_protection: args.subobject_deletion_protection,
        },
    );

    operator.run().await
}
