//! MySQL Kubernetes Operator
//!
//! This operator manages MySQL clusters on Kubernetes.
//!
//! ## Usage
//!
//! ```bash
//! # Run the operator (requires kubeconfig)
//! mysql-operator
//!
//! # Watch a single namespace with debug logging
//! RUST_LOG=debug mysql-operator --namespace databases
//!
//! # Print the CRDs instead of running
//! mysql-operator --print-crds
//! ```

use clap::Parser;
use kube::{Api, Client};
use mysql_operator::controllers::cluster_notifications;
use mysql_operator::{
    registrar, ClusterReconciler, EventDispatcher, KubePlatform, MySQLCluster, TemplateRenderer,
    TemplateSet,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// MySQL Kubernetes Operator
#[derive(Parser, Debug)]
#[command(name = "mysql-operator")]
#[command(version, about = "Kubernetes Operator for MySQL clusters")]
struct Args {
    /// Namespace to watch (empty for all namespaces)
    #[arg(long, default_value = "")]
    namespace: String,

    /// Deadline for each call to the Kubernetes API, in seconds
    #[arg(long, default_value = "30")]
    request_timeout_secs: u64,

    /// Directory with template overrides (cluster-service.yaml,
    /// cluster-service-read.yaml, cluster-statefulset.yaml)
    #[arg(long)]
    templates_dir: Option<PathBuf>,

    /// Do not install the CRDs on startup
    #[arg(long, default_value = "false")]
    skip_crd_install: bool,

    /// Print the CRDs as YAML and exit
    #[arg(long, default_value = "false")]
    print_crds: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_crds {
        print!("{}", registrar::definitions_yaml()?);
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting MySQL Kubernetes Operator");
    info!(
        "Watching namespace: {}",
        if args.namespace.is_empty() {
            "all"
        } else {
            &args.namespace
        }
    );

    let templates = match &args.templates_dir {
        Some(dir) => {
            info!("Loading template overrides from {}", dir.display());
            TemplateSet::from_dir(dir)?
        }
        None => TemplateSet::builtin(),
    };
    let renderer = TemplateRenderer::new(templates)?;

    let request_timeout = Duration::from_secs(args.request_timeout_secs);

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    if !args.skip_crd_install {
        registrar::register_schemas(&client, request_timeout).await?;
    }

    let platform = KubePlatform::new(client.clone(), request_timeout);
    let reconciler = Arc::new(ClusterReconciler::new(platform, renderer));

    let clusters: Api<MySQLCluster> = if args.namespace.is_empty() {
        Api::all(client.clone())
    } else {
        Api::namespaced(client.clone(), &args.namespace)
    };

    let dispatcher = EventDispatcher::new(reconciler);

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = dispatcher.run(cluster_notifications(clusters)) => {
            info!("Event dispatcher stopped");
        }
    }

    info!("MySQL Operator shutting down");
    Ok(())
}
