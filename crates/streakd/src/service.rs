//! Main service state and request handling

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use streak_api::{
    ClientRole, Command, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus,
    MAX_ACTIVITY_LIMIT, Response, ResponsePayload,
};
use streak_config::{Settings, StreakSettings, load_config};
use streak_core::{StreakOptions, StreakService};
use streak_ipc::{IpcServer, ServerMessage};
use streak_store::{ActivityStore, SqliteStore};
use streak_util::{ClientId, Clock, RateLimiter, StreakError, database_path, is_mock_time_active};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};

/// Main service state
pub struct Service {
    streaks: StreakService,
    ipc: Arc<IpcServer>,
    clock: Arc<dyn Clock>,
    rate_limiter: RateLimiter,
    settings: Settings,
    config_path: PathBuf,
}

impl Service {
    /// Open the store and bind the socket named in `settings`.
    ///
    /// `config_path` is only read again on reload.
    pub async fn new(settings: Settings, config_path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let data_dir = &settings.service.data_dir;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = database_path(data_dir);
        let store: Arc<dyn ActivityStore> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        let streaks = StreakService::new(store, clock.clone(), streak_options(&settings.streaks));

        let socket_path = &settings.service.socket_path;
        let mut ipc = IpcServer::new(socket_path);
        ipc.start()
            .await
            .with_context(|| format!("Failed to listen on {:?}", socket_path))?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        let rate_limiter = RateLimiter::new(settings.rate_limit.max_requests, settings.rate_limit.window);

        Ok(Self {
            streaks,
            ipc: Arc::new(ipc),
            clock,
            rate_limiter,
            settings,
            config_path: config_path.into(),
        })
    }

    pub fn socket_path(&self) -> &Path {
        self.ipc.socket_path()
    }

    /// Serve until SIGTERM or SIGINT. SIGHUP reloads the configuration.
    pub async fn run(self) -> Result<()> {
        let mut sigterm = signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

        let shutdown = async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            }
        };

        self.run_until(shutdown).await
    }

    /// Serve until `shutdown` completes
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut ipc_messages = self
            .ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let ipc_accept = self.ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        tokio::pin!(shutdown);

        info!("Service running");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                _ = sighup.recv() => {
                    info!("Received SIGHUP, reloading configuration");
                    if let Err(e) = self.reload_config() {
                        warn!(error = %e, "Configuration reload failed, keeping current settings");
                    }
                }

                msg = ipc_messages.recv() => match msg {
                    Some(msg) => self.handle_ipc_message(msg).await,
                    None => {
                        warn!("IPC message channel closed");
                        break;
                    }
                },
            }
        }

        info!("Shutting down streakd");
        self.ipc.broadcast_event(Event::new(self.clock.now(), EventPayload::Shutdown));
        self.ipc.shutdown();

        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                if !self.rate_limiter.check(&client_id) {
                    debug!(client_id = %client_id, "Request rate limited");
                    let response = Response::error(
                        request.request_id,
                        ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                    );
                    let _ = self.ipc.send_response(&client_id, response).await;
                    return;
                }

                // A client that left mid-request gets the least privileged role
                let role = self
                    .ipc
                    .get_client_info(&client_id)
                    .await
                    .map(|info| info.role)
                    .unwrap_or(ClientRole::Observer);

                let response = match self.handle_command(&client_id, role, request.command) {
                    Ok(payload) => Response::success(request.request_id, payload),
                    Err(info) => Response::error(request.request_id, info),
                };

                if let Err(e) = self.ipc.send_response(&client_id, response).await {
                    debug!(client_id = %client_id, error = %e, "Failed to send response");
                }
            }

            ServerMessage::ClientConnected { client_id, info } => {
                debug!(client_id = %client_id, role = ?info.role, uid = ?info.uid, "Client registered");
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");
                self.rate_limiter.remove_client(&client_id);
            }
        }
    }

    fn handle_command(
        &mut self,
        client_id: &ClientId,
        role: ClientRole,
        command: Command,
    ) -> Result<ResponsePayload, ErrorInfo> {
        match command {
            Command::GetStreaks { user_ids, kind } => {
                if user_ids.is_empty() {
                    return Err(ErrorInfo::new(ErrorCode::InvalidRequest, "user_ids must not be empty"));
                }
                let data = self.streaks.streaks(&user_ids, kind).map_err(error_info)?;
                Ok(ResponsePayload::Streaks { data })
            }

            Command::RecordActivity {
                user_id,
                kind,
                amount,
                game,
            } => {
                require(role.can_write(), "Shell or admin role required")?;

                let activity = self
                    .streaks
                    .record_activity(user_id, kind, amount, game)
                    .map_err(error_info)?;

                self.ipc.broadcast_event(Event::new(
                    self.clock.now(),
                    EventPayload::ActivityRecorded {
                        activity: activity.clone(),
                    },
                ));

                Ok(ResponsePayload::ActivityRecorded(activity))
            }

            Command::ListActivities {
                user_ids,
                limit,
                offset,
            } => {
                if user_ids.is_empty() {
                    return Err(ErrorInfo::new(ErrorCode::InvalidRequest, "user_ids must not be empty"));
                }
                let data = self
                    .streaks
                    .list_activities(&user_ids, limit.min(MAX_ACTIVITY_LIMIT), offset)
                    .map_err(error_info)?;
                Ok(ResponsePayload::Activities { data })
            }

            Command::DeleteActivity { id, user_id } => {
                require(role.can_write(), "Shell or admin role required")?;

                self.streaks.delete_activity(id, user_id).map_err(error_info)?;

                self.ipc.broadcast_event(Event::new(
                    self.clock.now(),
                    EventPayload::ActivityDeleted { id, user_id },
                ));

                Ok(ResponsePayload::ActivityDeleted { id })
            }

            Command::GetTotals { user_id } => {
                let data = self.streaks.totals(user_id).map_err(error_info)?;
                Ok(ResponsePayload::Totals { user_id, data })
            }

            Command::ReloadConfig => {
                require(role.can_reload_config(), "Admin role required")?;
                self.reload_config().map_err(error_info)?;
                Ok(ResponsePayload::ConfigReloaded)
            }

            Command::SubscribeEvents => Ok(ResponsePayload::Subscribed {
                client_id: client_id.clone(),
            }),

            Command::UnsubscribeEvents => Ok(ResponsePayload::Unsubscribed),

            Command::GetHealth => Ok(ResponsePayload::Health(HealthStatus {
                live: true,
                ready: true,
                store_healthy: self.streaks.is_store_healthy(),
                mock_time: is_mock_time_active(),
            })),

            Command::Ping => Ok(ResponsePayload::Pong),
        }
    }

    /// Re-read the config file and apply the settings that can change while
    /// running. Socket and data directory changes need a restart.
    fn reload_config(&mut self) -> std::result::Result<(), StreakError> {
        let settings = load_config(&self.config_path).map_err(|e| StreakError::config(e.to_string()))?;

        if settings.service.socket_path != self.settings.service.socket_path
            || settings.service.data_dir != self.settings.service.data_dir
        {
            warn!("Service paths changed in config; restart streakd to apply them");
        }

        self.streaks.set_options(streak_options(&settings.streaks));
        self.rate_limiter
            .reconfigure(settings.rate_limit.max_requests, settings.rate_limit.window);
        self.settings.streaks = settings.streaks;
        self.settings.rate_limit = settings.rate_limit;

        self.ipc
            .broadcast_event(Event::new(self.clock.now(), EventPayload::ConfigReloaded));

        info!(config_path = %self.config_path.display(), "Configuration reloaded");
        Ok(())
    }
}

fn streak_options(settings: &StreakSettings) -> StreakOptions {
    StreakOptions {
        earliest_activity: settings.earliest_activity,
        strict_ordering: settings.strict_ordering,
    }
}

fn require(allowed: bool, message: &str) -> Result<(), ErrorInfo> {
    if allowed {
        Ok(())
    } else {
        Err(ErrorInfo::new(ErrorCode::PermissionDenied, message))
    }
}

/// Map a service error onto the protocol's error codes
pub fn error_info(e: StreakError) -> ErrorInfo {
    let code = match &e {
        StreakError::InvalidDate(_) | StreakError::UnorderedDays { .. } => ErrorCode::DataIntegrity,
        StreakError::StoreError(_) => ErrorCode::StoreError,
        StreakError::NotFound(_) => ErrorCode::NotFound,
        StreakError::ConfigError(_) => ErrorCode::ConfigError,
        StreakError::ValidationError(_) => ErrorCode::InvalidRequest,
        StreakError::PermissionDenied(_) => ErrorCode::PermissionDenied,
        StreakError::RateLimited => ErrorCode::RateLimited,
        StreakError::IpcError(_) | StreakError::Internal(_) => ErrorCode::InternalError,
    };

    if code == ErrorCode::DataIntegrity || code == ErrorCode::StoreError {
        error!(error = %e, "Streak data unavailable");
    }

    ErrorInfo::new(code, e.to_string())
}
