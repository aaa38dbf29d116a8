mod app_config;
mod db_core;
mod error;
mod jira;
mod model;
mod observability;
mod prompt;
mod sync;
#[cfg(test)]
mod testing;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use mimalloc::MiMalloc;
use tokio::signal;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app_config::AppConfig;
use error::AppError;
use jira::JiraClient;
use model::{AnalyzedIssueCtrl, DbResultStore};
use prompt::ChatAnalyzer;
use sync::{SyncOrchestrator, SyncReport};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub type HttpClient = reqwest::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let cfg = AppConfig::from_env().context("Failed to load configuration")?;
    tracing::info!("{}", cfg);

    let conn = db_core::connect(&cfg.db).await?;
    tracing::info!(
        "Store holds {} analyzed issues",
        AnalyzedIssueCtrl::count(&conn).await?
    );

    let http_client = reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .timeout(Duration::from_secs(cfg.http.timeout_secs))
        .build()?;

    let jira_client = JiraClient::new(http_client.clone(), &cfg.jira);
    jira_client
        .check_connection()
        .await
        .map_err(|e| AppError::Connect(format!("issue tracker {}: {}", cfg.jira.url, e)))?;
    tracing::info!("Connected to issue tracker {}", cfg.jira.url);

    let orchestrator = Arc::new(SyncOrchestrator::new(
        Arc::new(jira_client),
        Arc::new(ChatAnalyzer::new(http_client, &cfg.ai)),
        Arc::new(DbResultStore::new(conn)),
        cfg.jira.clone(),
        cfg.sync.clone(),
    ));
    let shutdown = CancellationToken::new();

    if cfg.run_once() {
        tracing::info!("No sync interval configured, running a single pass");
        {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                wait_for_signal().await;
                tracing::info!("Shutdown signal received, cancelling sync");
                shutdown.cancel();
            });
        }

        let report = orchestrator.run(shutdown).await?.into_result()?;
        tracing::info!(
            "Sync finished: {} processed, {} skipped",
            report.processed,
            report.skipped
        );
        return Ok(());
    }

    let mut scheduler = JobScheduler::new().await?;

    {
        let orchestrator_clone = orchestrator.clone();
        let shutdown_clone = shutdown.clone();
        scheduler
            .add(Job::new_one_shot_async(
                Duration::from_secs(1),
                move |_uuid, _l| {
                    let orchestrator = orchestrator_clone.clone();
                    let shutdown = shutdown_clone.clone();
                    Box::pin(async move {
                        run_sync_pass(&orchestrator, shutdown).await;
                    })
                },
            )?)
            .await?;

        let interval = Duration::from_secs(cfg.sync.interval * 60);
        let orchestrator_clone = orchestrator.clone();
        let shutdown_clone = shutdown.clone();
        // Every `interval` minutes, run another pass
        scheduler
            .add(Job::new_repeated_async(interval, move |uuid, mut l| {
                let orchestrator = orchestrator_clone.clone();
                let shutdown = shutdown_clone.clone();
                Box::pin(async move {
                    run_sync_pass(&orchestrator, shutdown).await;

                    let next_tick = l.next_tick_for_job(uuid).await;
                    if let Ok(Some(ts)) = next_tick {
                        tracing::info!("Next sync pass is at {:?}", ts)
                    }
                })
            })?)
            .await?;
    }

    scheduler.set_shutdown_handler(Box::new(move || {
        Box::pin(async move {
            tracing::info!("Shutting down scheduler");
        })
    }));

    scheduler.start().await?;
    tracing::info!(
        "Scheduler started, syncing every {} minutes",
        cfg.sync.interval
    );

    shutdown_signal(scheduler, shutdown).await;
    Ok(())
}

/// Periodic passes log their failures and leave the schedule running
async fn run_sync_pass(orchestrator: &SyncOrchestrator, shutdown: CancellationToken) {
    match orchestrator
        .run(shutdown)
        .await
        .and_then(SyncReport::into_result)
    {
        Ok(report) => {
            tracing::info!(
                "Sync finished: {} processed, {} skipped",
                report.processed,
                report.skipped
            );
        }
        Err(e) => {
            tracing::error!("Sync failed: {}", e);
        }
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn shutdown_signal(mut scheduler: JobScheduler, shutdown: CancellationToken) {
    wait_for_signal().await;

    shutdown.cancel();
    if let Err(e) = scheduler.shutdown().await {
        tracing::error!("Failed to shut down scheduler: {:?}", e);
    }
    tracing::info!("Cleanups done, shutting down");
}
