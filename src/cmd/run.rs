//! `matchbridge run` - start the bridge.
//!
//! Loads the configuration, restores the persisted cache, connects to
//! the bridge and source clusters, then runs every route pipeline, the
//! periodic snapshot writer and the admin listener until SIGTERM or
//! Ctrl+C. Shutdown cancels every loop, drains the admin listener, writes
//! a final snapshot and flushes the destination writers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::Bridge;
use crate::cli::RunArgs;
use crate::config::model::Config;
use crate::config::sources::find_config_file;
use crate::config::FileSource;
use crate::error::BridgeError;
use crate::logging;
use crate::server::{self, AppState, LoadedConfig};
use crate::store::snapshot::{self, SnapshotWriter};
use crate::store::MatchStore;
use crate::transport::Transport;

type Transports = (Arc<dyn Transport>, HashMap<String, Arc<dyn Transport>>);

pub async fn execute(args: RunArgs) -> Result<(), BridgeError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    #[cfg(feature = "sentry-integration")]
    let _sentry_guard = args
        .sentry_dsn
        .as_ref()
        .map(|dsn| crate::sentry_integration::init(dsn, args.sentry_environment.as_deref()));

    let source = resolve_config_file(args.config.as_deref()).await?;
    let (mut config, version) = source.load().await?;

    if let Some(addr) = &args.admin_addr {
        config.admin.listen_addr.clone_from(addr);
    }
    if args.reset_cache {
        config.storage.reset_on_startup = true;
    }

    let store = Arc::new(MatchStore::new());
    if let Some(path) = &config.storage.path {
        if config.storage.reset_on_startup {
            tracing::info!(path = %path.display(), "reset on startup, snapshot ignored");
        } else {
            snapshot::restore(path, &store).await;
        }
    }

    let (bridge_transport, source_transports) = connect(&config)?;
    let mut bridge = Bridge::new(&config, Arc::clone(&store), bridge_transport, &source_transports)?;

    let cancel = CancellationToken::new();

    let config = Arc::new(config);
    let admin_handle = if config.admin.enabled {
        let state = Arc::new(AppState {
            config: LoadedConfig {
                config: Arc::clone(&config),
                version,
                source_name: source.path().display().to_string(),
                loaded_at: Instant::now(),
            },
            store: Arc::clone(&store),
            matchers: bridge.matchers(),
            stats: bridge.stats(),
            start_time: Instant::now(),
        });
        Some(start_admin(state, &config.admin.listen_addr, args.max_body, cancel.clone()).await?)
    } else {
        None
    };

    bridge.spawn(&cancel);

    let snapshot_handle = config.storage.path.clone().map(|path| {
        SnapshotWriter::spawn(
            Arc::clone(&store),
            path,
            config.storage.flush_interval(),
            cancel.clone(),
        )
    });

    tracing::info!(
        routes = config.routes.len(),
        reference_feeds = config.total_feeds(),
        source_clusters = source_transports.len(),
        "matchbridge started"
    );

    server::shutdown_signal().await;
    cancel.cancel();

    let failed = bridge.join().await;
    if failed > 0 {
        tracing::warn!(failed, "some route loops had stopped with errors");
    }

    if let Some(handle) = admin_handle {
        let grace = Duration::from_secs(args.shutdown_grace);
        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::error!(error = %e, "admin listener failed"),
            Ok(Err(e)) => tracing::error!(error = %e, "admin listener task failed"),
            Err(_) => tracing::warn!(grace_secs = args.shutdown_grace, "admin listener did not drain in time"),
        }
    }

    if let Some(handle) = snapshot_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "snapshot task failed");
        }
    }

    if let Err(e) = bridge.close().await {
        tracing::warn!(error = %e, "closing destination writers failed");
    }

    tracing::info!("matchbridge stopped");
    Ok(())
}

async fn resolve_config_file(explicit: Option<&Path>) -> Result<FileSource, BridgeError> {
    if let Some(path) = explicit {
        return Ok(FileSource::new(path));
    }

    match find_config_file(Path::new(".")).await {
        Some(path) => {
            tracing::info!(path = %path.display(), "auto-detected config file");
            Ok(FileSource::new(path))
        }
        None => Err(BridgeError::NoConfigSource {
            hint: "Provide --config <file> or place matchbridge.yaml in the working directory."
                .into(),
        }),
    }
}

async fn start_admin(
    state: Arc<AppState>,
    listen_addr: &str,
    max_body: usize,
    cancel: CancellationToken,
) -> Result<JoinHandle<std::io::Result<()>>, BridgeError> {
    let addr: SocketAddr = listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "admin listener started");

    let router = server::build_router(state, max_body);
    Ok(tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
    }))
}

#[cfg(feature = "kafka")]
fn connect(config: &Config) -> Result<Transports, BridgeError> {
    use crate::config::model::DEFAULT_SOURCE_CLUSTER;
    use crate::transport::kafka::{KafkaSettings, KafkaTransport};

    let settings = KafkaSettings {
        client_id: config.client_id.clone(),
        commit_interval: config.commit_interval(),
        start_offset: config.start_offset,
    };

    let bridge: Arc<dyn Transport> = Arc::new(KafkaTransport::new(
        "bridge",
        &config.bridge_cluster,
        settings.clone(),
    )?);

    let mut sources: HashMap<String, Arc<dyn Transport>> = HashMap::new();
    for cluster in config.all_source_clusters() {
        let name = if cluster.name == DEFAULT_SOURCE_CLUSTER {
            "source".to_string()
        } else {
            format!("source-{}", cluster.name)
        };
        let transport = KafkaTransport::new(name, &cluster.cluster(), settings.clone())?;
        sources.insert(cluster.name.clone(), Arc::new(transport));
    }
    Ok((bridge, sources))
}

#[cfg(not(feature = "kafka"))]
fn connect(_config: &Config) -> Result<Transports, BridgeError> {
    Err(BridgeError::TransportUnavailable { feature: "kafka" })
}
