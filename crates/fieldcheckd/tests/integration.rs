//! Integration tests for fieldcheckd
//!
//! These tests drive the config, store, engine and IPC crates together the
//! way the daemon wires them.

use chrono::{DateTime, Local, TimeZone};
use fieldcheck_api::{
    Command, ErrorCode, ErrorInfo, Response, ResponsePayload, ResponseResult, SessionStatus,
};
use fieldcheck_config::{Settings, parse_config};
use fieldcheck_core::{SessionEngine, authenticate, seed_records};
use fieldcheck_ipc::{IpcClient, IpcServer, ServerMessage};
use fieldcheck_store::{AuditEventType, SqliteStore, Store};
use fieldcheck_util::{FieldcheckError, FixedClock, GeoPoint, SchoolId, UserId};
use std::sync::Arc;
use tempfile::tempdir;

const CONFIG: &str = r#"
config_version = 1

[sessions]
auto_checkout_hours = 12

[[users]]
id = "u-prov"
display_name = "Pat Rivera"
role = "provider"

[[users]]
id = "u-admin"
display_name = "Dana Lee"
role = "administrator"

[[schools]]
id = "s-1"
name = "Lincoln Elementary"
latitude = 40.7128
longitude = -74.0060
check_in_radius_meters = 150

[[schedules]]
id = "sch-1"
provider_id = "u-prov"
school_id = "s-1"
day = "monday"
start = "09:00"
end = "17:00"
effective_from = "2025-01-01T00:00:00Z"
"#;

const NEAR: GeoPoint = GeoPoint::new(40.7129, -74.0060);

// 2025-06-02 is a Monday
fn monday(h: u32, m: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
}

struct Daemon {
    engine: SessionEngine,
    store: Arc<dyn Store>,
    clock: Arc<FixedClock>,
}

fn boot(store: Arc<dyn Store>, now: DateTime<Local>) -> Daemon {
    let settings: Settings = parse_config(CONFIG).unwrap();
    seed_records(
        store.as_ref(),
        &settings.users,
        &settings.schools,
        &settings.schedules,
    )
    .unwrap();

    let clock = Arc::new(FixedClock::new(now));
    let engine = SessionEngine::new(store.clone(), clock.clone(), settings.sessions);
    Daemon {
        engine,
        store,
        clock,
    }
}

fn prov() -> UserId {
    UserId::new("u-prov")
}

#[test]
fn test_check_in_then_out() {
    let d = boot(Arc::new(SqliteStore::in_memory().unwrap()), monday(12, 0));

    let checked_in = d
        .engine
        .check_in(&prov(), &SchoolId::new("s-1"), NEAR, None)
        .unwrap();
    assert_eq!(checked_in.distance_meters, 11);

    d.clock.set(monday(12, 30));
    let checked_out = d
        .engine
        .check_out(&prov(), &checked_in.session_id, NEAR)
        .unwrap();
    assert_eq!(checked_out.duration_minutes, 30);

    let session = d.store.get_session(&checked_in.session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.schedule_id.map(|s| s.to_string()), Some("sch-1".into()));
    assert_eq!(session.user_display_name, "Pat Rivera");

    let audits = d.store.get_recent_audits(10).unwrap();
    assert!(audits.iter().any(|a| matches!(a.event, AuditEventType::CheckedIn { .. })));
    assert!(audits.iter().any(|a| matches!(a.event, AuditEventType::CheckedOut { .. })));
}

#[test]
fn test_check_in_outside_schedule() {
    let d = boot(Arc::new(SqliteStore::in_memory().unwrap()), monday(18, 0));

    let err = d
        .engine
        .check_in(&prov(), &SchoolId::new("s-1"), NEAR, None)
        .unwrap_err();
    assert!(matches!(err, FieldcheckError::PreconditionFailed(_)));
    assert!(
        err.message()
            .starts_with("Check-in not allowed outside your scheduled times.")
    );
    assert!(d.engine.get_active_session(&prov()).unwrap().is_none());

    // Administrators are not schedule-gated
    let admin = UserId::new("u-admin");
    assert!(
        d.engine
            .check_in(&admin, &SchoolId::new("s-1"), NEAR, None)
            .is_ok()
    );
}

#[test]
fn test_stale_sweep_auto_checkout() {
    let d = boot(Arc::new(SqliteStore::in_memory().unwrap()), monday(9, 0));

    let checked_in = d
        .engine
        .check_in(&prov(), &SchoolId::new("s-1"), NEAR, None)
        .unwrap();

    d.clock.set(monday(22, 0));
    let report = d.engine.run_stale_sweep().unwrap();
    assert_eq!(report.closed, 1);

    let session = d.store.get_session(&checked_in.session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::AutoCompleted);
    assert_eq!(session.duration_minutes, Some(780));
    assert!(session.notes.contains("[Auto-checked out after 12 hours]"));

    // Nothing left to close
    let report = d.engine.run_stale_sweep().unwrap();
    assert_eq!(report.matched, 0);
    assert_eq!(report.closed, 0);

    // The provider can check in again
    d.clock.set(monday(22, 0) + chrono::Duration::days(7) - chrono::Duration::hours(10));
    assert!(
        d.engine
            .check_in(&prov(), &SchoolId::new("s-1"), NEAR, None)
            .is_ok()
    );
}

#[test]
fn test_unauthenticated_request_rejected() {
    let err = authenticate(None).unwrap_err();
    assert!(matches!(err, FieldcheckError::Unauthenticated(_)));
    assert_eq!(ErrorInfo::from(err).code, ErrorCode::Unauthenticated);
}

#[test]
fn test_sessions_survive_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("fieldcheck.db");

    let session_id = {
        let d = boot(Arc::new(SqliteStore::open(&db_path).unwrap()), monday(12, 0));
        d.engine
            .check_in(&prov(), &SchoolId::new("s-1"), NEAR, None)
            .unwrap()
            .session_id
    };

    // Reseeding on the next start leaves sessions alone
    let d = boot(Arc::new(SqliteStore::open(&db_path).unwrap()), monday(13, 0));
    let active = d.engine.get_active_session(&prov()).unwrap().unwrap();
    assert_eq!(active.id, session_id);

    let err = d
        .engine
        .check_in(&prov(), &SchoolId::new("s-1"), NEAR, None)
        .unwrap_err();
    assert!(matches!(err, FieldcheckError::Conflict(_)));
}

#[tokio::test]
async fn test_check_in_over_ipc() {
    let dir = tempdir().unwrap();
    let socket_path = dir.path().join("fieldcheckd.sock");

    let mut server = IpcServer::new(&socket_path);
    server.start().await.unwrap();
    let server = Arc::new(server);
    let mut messages = server.take_message_receiver().await.unwrap();

    let accept = server.clone();
    tokio::spawn(async move {
        let _ = accept.run().await;
    });

    let d = boot(Arc::new(SqliteStore::in_memory().unwrap()), monday(12, 0));
    let responder = server.clone();
    tokio::spawn(async move {
        while let Some(msg) = messages.recv().await {
            let ServerMessage::Request { client_id, request } = msg else {
                continue;
            };
            let response = match (&request.command, authenticate(request.caller.as_ref())) {
                (Command::CheckIn { school_id, location, .. }, Ok(caller)) => {
                    match d.engine.check_in(caller, school_id, *location, None) {
                        Ok(outcome) => Response::success(
                            request.request_id,
                            ResponsePayload::CheckedIn {
                                session_id: outcome.session_id,
                                distance_meters: outcome.distance_meters,
                                message: outcome.message,
                            },
                        ),
                        Err(e) => Response::error(request.request_id, e.into()),
                    }
                }
                (_, Err(e)) => Response::error(request.request_id, e.into()),
                _ => Response::success(request.request_id, ResponsePayload::Pong),
            };
            let _ = responder.send_response(&client_id, response).await;
        }
    });

    let mut client = IpcClient::connect(&socket_path).await.unwrap();
    let check_in = Command::CheckIn {
        school_id: SchoolId::new("s-1"),
        location: NEAR,
        device_info: None,
    };

    let response = client.send(check_in.clone()).await.unwrap();
    match response.result {
        ResponseResult::Err(e) => assert_eq!(e.code, ErrorCode::Unauthenticated),
        other => panic!("unexpected result: {:?}", other),
    }

    client.act_as(Some(prov()));
    let response = client.send(check_in).await.unwrap();
    match response.result {
        ResponseResult::Ok(ResponsePayload::CheckedIn { distance_meters, .. }) => {
            assert_eq!(distance_meters, 11)
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
