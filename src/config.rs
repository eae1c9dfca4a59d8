//! Process configuration
//!
//! All settings are available both as command-line flags and environment
//! variables. Defaults match an in-cluster deployment next to an OpenFGA
//! service.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::{DEFAULT_ALLOWED_PREFIXES, DEFAULT_CLUSTER_KEY};

/// ReBAC authorization webhook configuration
#[derive(Parser, Clone, Debug)]
#[command(name = "rebac-webhook", version, about, long_about = None)]
pub struct Config {
    /// Metrics listener address
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = "0.0.0.0:9090")]
    pub metrics_bind_address: SocketAddr,

    /// Health probe listener address
    #[arg(long, env = "HEALTH_PROBE_BIND_ADDRESS", default_value = "0.0.0.0:8090")]
    pub health_probe_bind_address: SocketAddr,

    /// Webhook listener address (TLS)
    #[arg(long, env = "WEBHOOK_BIND_ADDRESS", default_value = "0.0.0.0:9443")]
    pub webhook_bind_address: SocketAddr,

    /// gRPC target for OpenFGA
    #[arg(
        long,
        env = "OPENFGA_ADDR",
        default_value = "http://openfga.platform-mesh-system:8081"
    )]
    pub openfga_addr: String,

    /// Directory holding the webhook's tls.crt and tls.key
    #[arg(long, env = "WEBHOOK_CERT_DIR", default_value = "config")]
    pub webhook_cert_dir: PathBuf,

    /// `Extra` key identifying the logical cluster a request targets
    #[arg(long, env = "WEBHOOK_CLUSTER_KEY", default_value = DEFAULT_CLUSTER_KEY)]
    pub webhook_cluster_key: String,

    /// Allowed non-resource path prefixes
    #[arg(
        long,
        env = "WEBHOOK_ALLOWED_NONRESOURCE_PREFIXES",
        value_delimiter = ',',
        default_values_t = DEFAULT_ALLOWED_PREFIXES.map(String::from)
    )]
    pub webhook_allowed_nonresource_prefixes: Vec<String>,

    /// Name of the APIExportEndpointSlice used for cluster discovery
    #[arg(
        long,
        env = "KCP_API_EXPORT_ENDPOINT_SLICE_NAME",
        default_value = "core.platform-mesh.io"
    )]
    pub kcp_api_export_endpoint_slice_name: String,

    /// Path to a kubeconfig for the kcp workspace root (in-cluster config if unset)
    #[arg(long, env = "KCP_KUBECONFIG")]
    pub kcp_kubeconfig: Option<PathBuf>,
}

impl Config {
    /// Path to the webhook TLS certificate
    pub fn tls_cert_path(&self) -> PathBuf {
        self.webhook_cert_dir.join("tls.crt")
    }

    /// Path to the webhook TLS private key
    pub fn tls_key_path(&self) -> PathBuf {
        self.webhook_cert_dir.join("tls.key")
    }
}
