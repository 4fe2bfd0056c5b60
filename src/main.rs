use anyhow::anyhow;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use renewals::app::notifications::NotificationService;
use renewals::app::users::UserLifecycleService;
use renewals::config::AppConfig;
use renewals::infra::{db::Db, messaging, store::PgStore};
use renewals::{http, jobs, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect(&config).await?;
    db.migrate().await?;
    let store = Arc::new(PgStore::new(db));

    let messenger = match &config.messaging {
        Some(messaging_config) => {
            let messenger = messaging::build_messenger(messaging_config)?;
            tracing::info!(
                provider = messenger.provider(),
                delivery_mode = ?config.reminders.delivery_mode,
                "whatsapp provider configured"
            );
            Some(messenger)
        }
        None => {
            tracing::warn!("no whatsapp provider configured, sending is disabled");
            None
        }
    };

    let grace_days = i32::try_from(config.user_deletion_grace_days)
        .map_err(|_| anyhow!("invalid USER_DELETION_GRACE_DAYS: out of range"))?;

    let notifications = NotificationService::new(store.clone(), messenger, config.reminders.clone());
    let lifecycle = UserLifecycleService::new(store, grace_days);

    match config.app_mode.as_str() {
        "api" => {
            let state = AppState {
                notifications,
                lifecycle,
                admin_token: config.admin_token.clone(),
            };
            let app: Router = http::router(state).layer(TraceLayer::new_for_http());
            let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
            tracing::info!("listening on {}", config.http_addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        "worker" => {
            tracing::info!("starting worker mode");
            tokio::select! {
                result = jobs::reminders::run(notifications, lifecycle, config.reminders.interval_seconds) => {
                    result?;
                }
                _ = shutdown_signal() => {}
            }
        }
        "job" => {
            let summary = jobs::reminders::run_once(&notifications, &lifecycle).await?;
            tracing::info!(
                accounts = summary.report.accounts_processed,
                sends = summary.report.total_processed,
                "reminder job done"
            );
        }
        other => return Err(anyhow!("unknown APP_MODE: {}", other)),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
