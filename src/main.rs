//! ReBAC authorization webhook server

use std::sync::Arc;

use anyhow::Context as _;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use kube::Api;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rebac_webhook::authorizer::contextual::ContextualAuthorizer;
use rebac_webhook::authorizer::non_resource::NonResourceAuthorizer;
use rebac_webhook::authorizer::orgs::OrgsAuthorizer;
use rebac_webhook::authorizer::{union, Authorizer};
use rebac_webhook::cluster::{ClusterCache, OrgsStoreSource};
use rebac_webhook::config::Config;
use rebac_webhook::crd::Workspace;
use rebac_webhook::fga::{self, CheckClient, GrpcCheckClient};
use rebac_webhook::metrics;
use rebac_webhook::proto::open_fga_service_client::OpenFgaServiceClient;
use rebac_webhook::provider::ApiExportProvider;
use rebac_webhook::webhook::{health_router, webhook_router, WebhookState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install crypto provider
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install crypto provider");

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cfg = Config::parse();

    tracing::info!("Starting the authorization webhook server");

    let kube_config = load_kube_config(&cfg).await?;
    let client = kube::Client::try_from(kube_config.clone())
        .context("Failed to create Kubernetes client")?;

    // OpenFGA channel, shared by the startup lookup and the hot path
    let channel = tonic::transport::Endpoint::from_shared(cfg.openfga_addr.clone())
        .with_context(|| format!("Invalid OpenFGA address {:?}", cfg.openfga_addr))?
        .connect_lazy();
    let mut fga_raw = OpenFgaServiceClient::new(channel);
    let fga: Arc<dyn CheckClient> = Arc::new(GrpcCheckClient::new(fga_raw.clone()));

    // Resolve the organizations workspace and its store
    let workspaces: Api<Workspace> = Api::all(client.clone());
    let orgs_workspace = workspaces
        .get("orgs")
        .await
        .context("Cannot get organization's workspace")?;
    let orgs_workspace_id = orgs_workspace
        .spec
        .cluster
        .context("Workspace 'orgs' carries no cluster id")?;

    let orgs_store_id = fga::find_store_id(&mut fga_raw, "orgs")
        .await
        .context("Cannot get organization's store ID")?;

    tracing::info!(
        orgs_workspace_id = %orgs_workspace_id,
        orgs_store_id = %orgs_store_id,
        "Resolved organizations workspace"
    );

    // Cluster cache, fed by the discovery provider
    let store_source = Arc::new(OrgsStoreSource::new(&kube_config)?);
    let cache = Arc::new(ClusterCache::new(store_source));

    let authorizers: Vec<Arc<dyn Authorizer>> = vec![
        Arc::new(NonResourceAuthorizer::new(
            cfg.webhook_allowed_nonresource_prefixes.clone(),
        )),
        Arc::new(OrgsAuthorizer::new(
            fga.clone(),
            &cfg.webhook_cluster_key,
            &orgs_workspace_id,
            &orgs_store_id,
        )),
        Arc::new(ContextualAuthorizer::new(
            fga,
            cache.clone(),
            &cfg.webhook_cluster_key,
        )),
    ];
    let chain = union::new(authorizers);

    let cancel = CancellationToken::new();

    // Discovery provider engages clusters in the background
    let provider = ApiExportProvider::new(
        kube_config.clone(),
        cfg.kcp_api_export_endpoint_slice_name.clone(),
    )?;
    let provider_task = tokio::spawn(provider.run(cache, cancel.clone()));

    // Webhook server (TLS)
    let tls_config = RustlsConfig::from_pem_file(cfg.tls_cert_path(), cfg.tls_key_path())
        .await
        .context("Failed to load webhook TLS material")?;

    let webhook_app = webhook_router(Arc::new(WebhookState::new(chain)));
    let webhook_addr = cfg.webhook_bind_address;
    tracing::info!(addr = %webhook_addr, "Webhook server listening");

    let webhook_server = tokio::spawn(async move {
        axum_server::bind_rustls(webhook_addr, tls_config)
            .serve(webhook_app.into_make_service())
            .await
            .map_err(|e| tracing::error!(error = %e, "Webhook server error"))
    });

    let health_server = tokio::spawn(serve_plain(
        cfg.health_probe_bind_address,
        health_router(),
        "health",
    ));
    let metrics_server = tokio::spawn(serve_plain(
        cfg.metrics_bind_address,
        metrics::metrics_router(),
        "metrics",
    ));

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down");
    cancel.cancel();

    webhook_server.abort();
    health_server.abort();
    metrics_server.abort();
    let _ = provider_task.await;

    Ok(())
}

/// Load the workspace-root config from an explicit kubeconfig or the
/// ambient environment
async fn load_kube_config(cfg: &Config) -> anyhow::Result<kube::Config> {
    match &cfg.kcp_kubeconfig {
        Some(path) => {
            let kubeconfig = kube::config::Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &Default::default())
                .await
                .context("Failed to build config from kubeconfig")
        }
        None => kube::Config::infer()
            .await
            .context("Failed to infer Kubernetes configuration"),
    }
}

/// Serve a router over plain HTTP, logging instead of crashing on failure
async fn serve_plain(addr: std::net::SocketAddr, router: axum::Router, name: &'static str) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            tracing::info!(addr = %addr, server = name, "Listener started");
            listener
        }
        Err(e) => {
            tracing::error!(error = %e, addr = %addr, server = name, "Failed to bind listener");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!(error = %e, server = name, "Server error");
    }
}
