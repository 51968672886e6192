use crate::config::Settings;
use crate::domain::{CompletedSession, RunId, SessionOrdinal};
use crate::engine::Orchestrator;
use crate::report::Reporter;
use crate::transport::http::HttpTransport;
use crate::transport::memory::InMemoryTransport;
use crate::transport::Transport;
use crate::Result;
use std::io::Write;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Main application struct that coordinates a harness run
pub struct Application {
    settings: Settings,
    run_id: RunId,
}

impl Application {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            run_id: RunId::generate(),
        }
    }

    /// Load settings from files and environment, plus an optional explicit file
    pub fn from_environment(config_path: Option<&Path>) -> Result<Self> {
        Ok(Self::new(Settings::load(config_path)?))
    }

    /// Run every session to completion and return them in ordinal order
    #[instrument(skip(self), fields(run = %self.run_id))]
    pub async fn run(&self) -> Vec<CompletedSession> {
        let service = &self.settings.service;
        if service.dry_run {
            info!("Dry run against the in-process simulated service");
            self.execute(|_| InMemoryTransport::new()).await
        } else {
            info!(base_url = %service.base_url, "Running against ingestion service");
            let timeout = self.settings.request_timeout();
            self.execute(|_| HttpTransport::new(service.base_url.clone(), timeout))
                .await
        }
    }

    async fn execute<F, T>(&self, transport_factory: F) -> Vec<CompletedSession>
    where
        F: Fn(SessionOrdinal) -> T,
        T: Transport + 'static,
    {
        let orchestrator = Orchestrator::new(transport_factory, self.settings.poller_config());

        let cancel = orchestrator.cancel_handle();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling outstanding sessions");
                cancel.cancel();
            }
        });

        let sessions = orchestrator
            .run_all(
                self.settings.harness.session_count,
                self.settings.session_config(),
            )
            .await;
        interrupt.abort();
        sessions
    }

    /// Render the completed sessions in the configured report format
    pub fn write_report(&self, sessions: &[CompletedSession], out: &mut impl Write) -> Result<()> {
        let report = &self.settings.report;
        let rendered = Reporter::new(report.format, report.color).render(sessions)?;
        writeln!(out, "{rendered}")?;
        out.flush()?;
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }
}
