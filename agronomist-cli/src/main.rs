use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use agronomist_controller::{OwnerIdentity, ScalingPolicyReconciler, Store};

/// agronomist autoscales Kubernetes deployments using OPA-style policies.
#[derive(Parser, Debug)]
#[command(name = "agronomist", version, about)]
struct Cli {
    /// Path to kubeconfig; assumes in-cluster config if not provided.
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Name of the pod agronomist is running in, used to claim scaling
    /// policies.
    #[arg(long, env = "POD", default_value = "local")]
    pod: String,

    /// UID of the pod agronomist is running in.
    #[arg(long, env = "POD_UID", default_value = "11111111-1111-1111-1111-111111111111")]
    pod_uid: String,

    /// Namespace agronomist is running in; scaling policy statuses are
    /// created here.
    #[arg(long, env = "NAMESPACE", default_value = "kube-system")]
    namespace: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    agronomist_core::logging::init();

    let cli = Cli::parse();

    let client = match &cli.kubeconfig {
        Some(path) => {
            let kubeconfig = kube::config::Kubeconfig::read_from(path)?;
            let config = kube::Config::from_custom_kubeconfig(
                kubeconfig,
                &kube::config::KubeConfigOptions::default(),
            )
            .await?;
            kube::Client::try_from(config)?
        }
        None => kube::Client::try_default().await?,
    };

    let store = Store::new(client);
    let owner = OwnerIdentity {
        namespace: cli.namespace,
        name: cli.pod,
        uid: cli.pod_uid,
    };

    let root = CancellationToken::new();

    let store_for_caches = store.clone();
    let cache_scope = root.child_token();
    let caches = tokio::spawn(async move { store_for_caches.start(cache_scope).await });

    let reconciler = ScalingPolicyReconciler::new(owner, store);
    let reconciler_scope = root.child_token();
    let reconciler = tokio::spawn(reconciler.run(reconciler_scope));

    info!("agronomist started");

    wait_for_shutdown_signal().await;
    root.cancel();

    let _ = tokio::join!(caches, reconciler);
    info!("agronomist stopped");

    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
