//! External task worker bootstrap (§6 CLI/bootstrap surface, §10.3): reads
//! a configuration document, constructs the task catalog with its external
//! dependencies, starts one worker pool per enabled task type, and installs
//! a signal handler for graceful drain.

mod config;

use std::sync::Arc;
use std::time::Duration;

use jobworker_runtime::pool::{PoolConfig, WorkerPool};
use jobworker_runtime::task::Task;
use jobworker_runtime::OrchestratorClient;
use jobworker_shared::logger::{self, Field, Logger};
use jobworker_shared::template_registry::TemplateRegistry;
use jobworker_tasks::{
    AuthLogoutTask, EmailSendTask, EsQueryTask, FranchiseAccountLoader, MatchScoreTask,
    PriorityRoutingTask, ReadinessScoreTask, RedisFastStore, RelevanceRankingTask,
    ResponseBuildTask, UserProfileLoader,
};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;

use config::WorkerConfig;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();
    logger::install_production_subscriber();
    let logger = Logger::production();

    let config_path = std::env::var("JOBWORKER_CONFIG_PATH").unwrap_or_else(|_| "jobworker".to_string());
    let config = WorkerConfig::load(&config_path)?;

    logger.info(
        "starting jobworker",
        &[
            Field::new("version", &config.version),
            Field::new("worker_id", &config.worker_id),
        ],
    );

    let client = build_orchestrator_client(&config)?;
    let catalog = build_catalog(&config).await?;

    run(config, client, catalog, logger).await
}

/// The runnable core of the bootstrap contract (§6), generic over the
/// orchestrator client so it can be driven by a fake in tests without a
/// live broker.
async fn run(
    config: WorkerConfig,
    client: Arc<dyn OrchestratorClient>,
    catalog: Vec<(Arc<dyn Task>, usize, Duration, Duration, Duration)>,
    logger: Logger,
) -> Result<(), anyhow::Error> {
    let mut pools = Vec::with_capacity(catalog.len());
    for (task, max_jobs_active, activation_timeout, execute_timeout, drain_deadline) in catalog {
        let pool_config = PoolConfig {
            task_type: task.task_type().to_string(),
            worker_id: config.worker_id.clone(),
            max_in_flight: max_jobs_active,
            activation_timeout,
            drain_deadline,
        };
        let pool_logger = logger.child([Field::new("task_type", task.task_type())]);
        let pool = Arc::new(
            WorkerPool::new(pool_config, client.clone(), task, pool_logger)
                .with_execute_timeout(execute_timeout),
        );
        let handle = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.run().await })
        };
        pools.push((pool, handle));
    }

    shutdown_signal().await;
    logger.info("shutdown signal received, draining pools", &[]);

    for (pool, _) in &pools {
        pool.stop();
    }
    for (_, handle) in pools {
        let _ = handle.await;
    }

    logger.info("jobworker shutdown complete", &[]);
    Ok(())
}

/// Build the concrete task catalog from configuration, wiring each task to
/// its fast store, system-of-record loaders, and external clients (§4.10).
async fn build_catalog(
    config: &WorkerConfig,
) -> Result<Vec<(Arc<dyn Task>, usize, Duration, Duration, Duration)>, anyhow::Error> {
    let fast_store = Arc::new(RedisFastStore::connect(&config.fast_store.url).await?);
    let pg_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.system_of_record.connection_string)
        .await?;

    let registry = Arc::new(TemplateRegistry::from_path(
        &config.template_registry.document_path,
        Duration::from_secs(config.template_registry.ttl_secs),
    ));

    let franchise_loader = Arc::new(FranchiseAccountLoader {
        pool: pg_pool.clone(),
    });
    let profile_loader = Arc::new(UserProfileLoader { pool: pg_pool.clone() });

    let es_query = Arc::new(EsQueryTask::new(config.search.base_url.clone()));
    let email_send = Arc::new(EmailSendTask::new(
        &config.smtp.relay,
        &config.smtp.username,
        &config.smtp.password,
        config.smtp.starttls,
    )?);

    let mut tasks: Vec<(Arc<dyn Task>, usize, Duration, Duration, Duration)> = Vec::new();

    for task_config in &config.tasks {
        let task: Arc<dyn Task> = match task_config.task_type.as_str() {
            "priority_routing" => Arc::new(PriorityRoutingTask::new(
                fast_store.clone(),
                franchise_loader.clone(),
                Duration::from_secs(config.fast_store.default_ttl_secs),
            )),
            "readiness_score" => Arc::new(ReadinessScoreTask),
            "match_score" => Arc::new(MatchScoreTask::new(
                fast_store.clone(),
                profile_loader.clone(),
                Duration::from_secs(config.fast_store.default_ttl_secs),
            )),
            "relevance_ranking" => Arc::new(RelevanceRankingTask),
            "es_query" => es_query.clone(),
            "email_send" => email_send.clone(),
            "auth_logout" => Arc::new(AuthLogoutTask::new(Some(fast_store.clone()))),
            "response_build" => Arc::new(ResponseBuildTask::new(registry.clone(), config.version.clone())),
            other => return Err(anyhow::anyhow!("unknown task type in configuration: {other}")),
        };

        tasks.push((
            task,
            task_config.max_jobs_active,
            task_config.activation_timeout(),
            task_config.execute_timeout(),
            task_config.drain_timeout(),
        ));
    }

    Ok(tasks)
}

/// Construct the orchestrator client. The streaming wire protocol against
/// the orchestrator is a named boundary this runtime does not re-specify
/// (§1, §6) — deployments plug in a client implementing
/// [`OrchestratorClient`] for their broker's transport.
fn build_orchestrator_client(_config: &WorkerConfig) -> Result<Arc<dyn OrchestratorClient>, anyhow::Error> {
    Err(anyhow::anyhow!(
        "no orchestrator client configured: wire a concrete OrchestratorClient implementation for your broker's transport"
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
