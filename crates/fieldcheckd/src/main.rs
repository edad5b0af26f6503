//! fieldcheckd - The fieldcheck background service
//!
//! This is the main entry point for the fieldcheckd service.
//! It wires together all the components:
//! - Configuration loading and record seeding
//! - Store initialization
//! - Session engine
//! - Stale-session sweep timer
//! - IPC server

use anyhow::{Context, Result};
use clap::Parser;
use fieldcheck_api::{
    ClientRole, Command, ErrorCode, ErrorInfo, HealthStatus, Request, Response, ResponsePayload,
};
use fieldcheck_config::load_config;
use fieldcheck_core::{SessionEngine, authenticate, seed_records};
use fieldcheck_ipc::{IpcServer, ServerMessage};
use fieldcheck_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use fieldcheck_util::{ClientId, RateLimiter, SystemClock, default_config_path};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 500;

/// fieldcheckd - Geofenced check-in service for school-based providers
#[derive(Parser, Debug)]
#[command(name = "fieldcheckd")]
#[command(about = "Geofenced check-in service for school-based providers", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/fieldcheck/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set FIELDCHECK_SOCKET env var)
    #[arg(short, long, env = "FIELDCHECK_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set FIELDCHECK_DATA_DIR env var)
    #[arg(short, long, env = "FIELDCHECK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    engine: Arc<SessionEngine>,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
    rate_limiter: RateLimiter<ClientId>,
    sweep_interval: Duration,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let settings = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            users = settings.users.len(),
            schools = settings.schools.len(),
            schedules = settings.schedules.len(),
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| settings.service.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("fieldcheck.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        seed_records(
            store.as_ref(),
            &settings.users,
            &settings.schools,
            &settings.schedules,
        )
        .context("Failed to seed records from config")?;

        store.append_audit(AuditEvent::new(AuditEventType::ConfigLoaded {
            users: settings.users.len(),
            schools: settings.schools.len(),
            schedules: settings.schedules.len(),
        }))?;

        let sweep_interval = settings.sessions.sweep_interval;
        let engine = SessionEngine::new(store.clone(), Arc::new(SystemClock), settings.sessions);

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        // 30 requests per second per client
        let rate_limiter = RateLimiter::new(30, Duration::from_secs(1));

        Ok(Self {
            engine: Arc::new(engine),
            ipc: Arc::new(ipc),
            store,
            rate_limiter,
            sweep_interval,
        })
    }

    async fn run(self) -> Result<()> {
        let ipc_ref = self.ipc.clone();
        let mut ipc_messages = ipc_ref
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let engine = self.engine.clone();
        let rate_limiter = Arc::new(Mutex::new(self.rate_limiter));
        let store = self.store.clone();

        let ipc_accept = ipc_ref.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        // First tick completes immediately, so the sweep also runs at startup
        let mut sweep_timer = tokio::time::interval(self.sweep_interval);
        sweep_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(sweep_interval_secs = self.sweep_interval.as_secs(), "Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                _ = sweep_timer.tick() => {
                    if let Err(e) = engine.run_stale_sweep() {
                        error!(error = %e, "Scheduled sweep failed");
                    }
                }

                Some(msg) = ipc_messages.recv() => {
                    Self::handle_ipc_message(&engine, &ipc_ref, &store, &rate_limiter, msg).await;
                }
            }
        }

        info!("Shutting down fieldcheckd");

        if let Err(e) = store.append_audit(AuditEvent::new(AuditEventType::ServiceStopped)) {
            warn!(error = %e, "Failed to log service shutdown");
        }

        ipc_ref.shutdown();

        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(
        engine: &Arc<SessionEngine>,
        ipc: &Arc<IpcServer>,
        store: &Arc<dyn Store>,
        rate_limiter: &Arc<Mutex<RateLimiter<ClientId>>>,
        msg: ServerMessage,
    ) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                {
                    let mut limiter = rate_limiter.lock().await;
                    if !limiter.check(&client_id) {
                        let response = Response::error(
                            request.request_id,
                            ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                        );
                        let _ = ipc.send_response(&client_id, response).await;
                        return;
                    }
                }

                let role = ipc
                    .get_client_info(&client_id)
                    .await
                    .map(|info| info.role)
                    .unwrap_or(ClientRole::Frontend);

                let response = handle_request(engine, role, request);

                if let Err(e) = ipc.send_response(&client_id, response).await {
                    debug!(client_id = %client_id, error = %e, "Response not delivered");
                }
            }

            ServerMessage::ClientConnected { client_id, info } => {
                info!(
                    client_id = %client_id,
                    role = ?info.role,
                    uid = ?info.uid,
                    "Client connected"
                );

                let _ = store.append_audit(AuditEvent::new(AuditEventType::ClientConnected {
                    client_id: client_id.to_string(),
                    role: format!("{:?}", info.role),
                    uid: info.uid,
                }));
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");

                let _ = store.append_audit(AuditEvent::new(AuditEventType::ClientDisconnected {
                    client_id: client_id.to_string(),
                }));

                rate_limiter.lock().await.forget(&client_id);
            }
        }
    }
}

/// Dispatch one request to the engine and build its response
fn handle_request(engine: &SessionEngine, role: ClientRole, request: Request) -> Response {
    let request_id = request.request_id;

    if request.api_version != fieldcheck_api::API_VERSION {
        return Response::error(
            request_id,
            ErrorInfo::new(
                ErrorCode::InvalidRequest,
                format!("Unsupported API version {}", request.api_version),
            ),
        );
    }

    let caller = if request.command.requires_caller() {
        match authenticate(request.caller.as_ref()) {
            Ok(caller) => Some(caller.clone()),
            Err(e) => return Response::error(request_id, e.into()),
        }
    } else {
        None
    };

    match (request.command, caller) {
        (
            Command::CheckIn {
                school_id,
                location,
                device_info,
            },
            Some(caller),
        ) => match engine.check_in(&caller, &school_id, location, device_info) {
            Ok(outcome) => Response::success(
                request_id,
                ResponsePayload::CheckedIn {
                    session_id: outcome.session_id,
                    distance_meters: outcome.distance_meters,
                    message: outcome.message,
                },
            ),
            Err(e) => Response::error(request_id, e.into()),
        },

        (
            Command::CheckOut {
                session_id,
                location,
            },
            Some(caller),
        ) => match engine.check_out(&caller, &session_id, location) {
            Ok(outcome) => Response::success(
                request_id,
                ResponsePayload::CheckedOut {
                    duration_minutes: outcome.duration_minutes,
                    message: outcome.message,
                },
            ),
            Err(e) => Response::error(request_id, e.into()),
        },

        (Command::UpdateNotes { session_id, notes }, Some(caller)) => {
            match engine.update_notes(&caller, &session_id, &notes) {
                Ok(()) => Response::success(request_id, ResponsePayload::NotesUpdated),
                Err(e) => Response::error(request_id, e.into()),
            }
        }

        (Command::GetActiveSession, Some(caller)) => match engine.get_active_session(&caller) {
            Ok(session) => {
                Response::success(request_id, ResponsePayload::ActiveSession { session })
            }
            Err(e) => Response::error(request_id, e.into()),
        },

        (Command::SessionHistory { limit }, Some(caller)) => {
            let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
            match engine.session_history(&caller, limit) {
                Ok(sessions) => {
                    Response::success(request_id, ResponsePayload::SessionHistory { sessions })
                }
                Err(e) => Response::error(request_id, e.into()),
            }
        }

        (Command::GetHealth, _) => {
            let store_ok = engine.store().is_healthy();
            Response::success(
                request_id,
                ResponsePayload::Health(HealthStatus {
                    live: true,
                    ready: store_ok,
                    store_ok,
                }),
            )
        }

        (Command::RunStaleSweep, _) => {
            if !role.can_run_sweep() {
                return Response::error(
                    request_id,
                    ErrorInfo::new(ErrorCode::PermissionDenied, "Admin access required"),
                );
            }
            match engine.run_stale_sweep() {
                Ok(report) => Response::success(request_id, ResponsePayload::SweepCompleted(report)),
                Err(e) => Response::error(request_id, e.into()),
            }
        }

        (Command::Ping, _) => Response::success(request_id, ResponsePayload::Pong),

        // requires_caller() guarantees a caller for the commands above
        (_, None) => Response::error(
            request_id,
            ErrorInfo::new(ErrorCode::Unauthenticated, "Authentication required"),
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "fieldcheckd starting");

    if fieldcheck_util::is_mock_time_active() {
        warn!(now = %fieldcheck_util::now(), "Mock time is active");
    }

    let service = Service::new(&args).await?;
    service.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use fieldcheck_api::{ResponseResult, Role, School, User};
    use fieldcheck_config::SessionRules;
    use fieldcheck_util::{FixedClock, GeoPoint, SchoolId, UserId};

    fn engine() -> SessionEngine {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .put_user(&User {
                id: UserId::new("u-admin"),
                display_name: "Dana".into(),
                email: String::new(),
                role: Role::Administrator,
            })
            .unwrap();
        store
            .put_school(&School {
                id: SchoolId::new("s-1"),
                name: "Lincoln Elementary".into(),
                location: GeoPoint::new(40.7128, -74.0060),
                check_in_radius_meters: None,
            })
            .unwrap();
        let clock = FixedClock::new(Local.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap());
        SessionEngine::new(store, Arc::new(clock), SessionRules::default())
    }

    fn error_code(response: &Response) -> Option<ErrorCode> {
        match &response.result {
            ResponseResult::Err(e) => Some(e.code),
            ResponseResult::Ok(_) => None,
        }
    }

    #[test]
    fn caller_required_for_session_commands() {
        let engine = engine();
        let response = handle_request(
            &engine,
            ClientRole::Admin,
            Request::new(1, Command::GetActiveSession),
        );
        assert_eq!(error_code(&response), Some(ErrorCode::Unauthenticated));

        let response = handle_request(&engine, ClientRole::Frontend, Request::new(2, Command::Ping));
        assert!(matches!(response.result, ResponseResult::Ok(ResponsePayload::Pong)));
    }

    #[test]
    fn check_in_round_trip() {
        let engine = engine();
        let request = Request::new(
            7,
            Command::CheckIn {
                school_id: SchoolId::new("s-1"),
                location: GeoPoint::new(40.7129, -74.0060),
                device_info: None,
            },
        )
        .with_caller(UserId::new("u-admin"));

        let response = handle_request(&engine, ClientRole::Frontend, request);
        assert_eq!(response.request_id, 7);
        match response.result {
            ResponseResult::Ok(ResponsePayload::CheckedIn {
                distance_meters,
                message,
                ..
            }) => {
                assert_eq!(distance_meters, 11);
                assert_eq!(message, "Checked in at Lincoln Elementary");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let active = handle_request(
            &engine,
            ClientRole::Frontend,
            Request::new(8, Command::GetActiveSession).with_caller(UserId::new("u-admin")),
        );
        assert!(matches!(
            active.result,
            ResponseResult::Ok(ResponsePayload::ActiveSession { session: Some(_) })
        ));
    }

    #[test]
    fn sweep_requires_admin_peer() {
        let engine = engine();
        let response = handle_request(
            &engine,
            ClientRole::Frontend,
            Request::new(1, Command::RunStaleSweep),
        );
        assert_eq!(error_code(&response), Some(ErrorCode::PermissionDenied));

        let response = handle_request(&engine, ClientRole::Admin, Request::new(2, Command::RunStaleSweep));
        assert!(matches!(
            response.result,
            ResponseResult::Ok(ResponsePayload::SweepCompleted(report)) if report.matched == 0
        ));
    }

    #[test]
    fn wrong_api_version_rejected() {
        let engine = engine();
        let mut request = Request::new(1, Command::GetHealth);
        request.api_version = 99;
        let response = handle_request(&engine, ClientRole::Admin, request);
        assert_eq!(error_code(&response), Some(ErrorCode::InvalidRequest));
    }

    #[test]
    fn health_reports_store() {
        let engine = engine();
        let response = handle_request(&engine, ClientRole::Frontend, Request::new(1, Command::GetHealth));
        match response.result {
            ResponseResult::Ok(ResponsePayload::Health(health)) => {
                assert!(health.live);
                assert!(health.ready);
                assert!(health.store_ok);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
