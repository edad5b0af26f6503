//! Stale-session sweep
//!
//! Force-closes sessions left active past the auto-checkout timeout. Each
//! session is closed independently: one failed update is logged and the rest
//! of the batch carries on. Only a failed initial query fails the run.

use fieldcheck_api::SweepReport;
use fieldcheck_store::{AuditEvent, AuditEventType, Store};
use fieldcheck_util::{Clock, FieldcheckError, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::session;

pub struct StaleSessionSweep {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    timeout_hours: u32,
}

impl StaleSessionSweep {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, timeout_hours: u32) -> Self {
        Self {
            store,
            clock,
            timeout_hours,
        }
    }

    pub fn run(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let cutoff = chrono::Duration::try_hours(i64::from(self.timeout_hours))
            .and_then(|timeout| now.checked_sub_signed(timeout))
            .ok_or_else(|| {
                FieldcheckError::internal(format!(
                    "Auto-checkout timeout of {} hours is out of range",
                    self.timeout_hours
                ))
            })?;

        let stale = self.store.query_stale_active_sessions(cutoff).map_err(|e| {
            error!(error = %e, cutoff = %cutoff, "Stale session query failed");
            e
        })?;

        let mut report = SweepReport {
            matched: stale.len(),
            ..SweepReport::default()
        };

        if stale.is_empty() {
            return Ok(report);
        }

        for record in &stale {
            let closing = session::auto_check_out(record, self.timeout_hours, now);

            match self.store.update_session(&record.id, &closing.patch) {
                Ok(true) => {
                    report.closed += 1;
                    info!(
                        session_id = %record.id,
                        user_id = %record.user_id,
                        duration_minutes = closing.duration_minutes,
                        "Auto-checked out"
                    );
                    self.audit(AuditEventType::AutoCheckedOut {
                        session_id: record.id.clone(),
                        user_id: record.user_id.clone(),
                        duration_minutes: closing.duration_minutes,
                    });
                }
                Ok(false) => {
                    // Checked out between query and update
                    report.skipped += 1;
                    info!(session_id = %record.id, "Session no longer active, skipped");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(session_id = %record.id, error = %e, "Auto-checkout failed");
                }
            }
        }

        info!(
            matched = report.matched,
            closed = report.closed,
            skipped = report.skipped,
            failed = report.failed,
            "Stale session sweep complete"
        );
        self.audit(AuditEventType::SweepCompleted {
            matched: report.matched,
            closed: report.closed,
            skipped: report.skipped,
            failed: report.failed,
        });

        Ok(report)
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::at(self.clock.now(), event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }
}
