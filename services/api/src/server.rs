use crate::cli::ServeArgs;
use crate::infra::{registration_service, ApiService, AppState, StaticPartnerDirectory};
use crate::routes::with_registration_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use voter_registration::config::AppConfig;
use voter_registration::error::AppError;
use voter_registration::telemetry;
use voter_registration::workflows::registration::ReminderJob;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let partners = StaticPartnerDirectory::load(args.partners.as_deref())?;
    let sweep_every = Duration::from_secs(config.registration.sweep_interval_seconds.max(1));
    let (reminder_sender, reminder_receiver) = mpsc::unbounded_channel();
    let service = registration_service(config.registration.clone(), partners, reminder_sender);

    spawn_reminder_worker(service.clone(), reminder_receiver);
    spawn_stale_sweep(service.clone(), sweep_every);

    let app = with_registration_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "voter registration service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Deliver each queued reminder once its scheduled time arrives.
fn spawn_reminder_worker(service: Arc<ApiService>, mut jobs: UnboundedReceiver<ReminderJob>) {
    tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            let service = service.clone();
            tokio::spawn(async move {
                let wait = (job.run_at - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                service.deliver_reminder(job.registrant_id);
            });
        }
        warn!("reminder queue closed");
    });
}

fn spawn_stale_sweep(service: Arc<ApiService>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(error) = service.sweep_stale() {
                warn!(%error, "stale registrant sweep failed");
            }
        }
    });
}
