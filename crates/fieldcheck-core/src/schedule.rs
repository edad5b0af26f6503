//! Schedule slot resolution

use chrono::{DateTime, Local};
use fieldcheck_api::ScheduleSlot;
use fieldcheck_store::Store;
use fieldcheck_util::{Result, SchoolId, UserId, WallClock, day_of_week, is_within_time_range};
use std::sync::Arc;
use tracing::debug;

/// Is `now`'s time of day inside the slot's window (inclusive, minute resolution)
pub fn is_within_schedule(slot: &ScheduleSlot, now: &DateTime<Local>) -> bool {
    is_within_time_range(slot.start, slot.end, WallClock::of(now))
}

/// Pick the slot that applies at `now` from one weekday's candidates.
///
/// When several qualify the lowest slot id wins.
pub fn select_slot<'a>(
    candidates: impl IntoIterator<Item = &'a ScheduleSlot>,
    now: &DateTime<Local>,
) -> Option<&'a ScheduleSlot> {
    let today = day_of_week(now);
    candidates
        .into_iter()
        .filter(|slot| slot.day == today)
        .filter(|slot| slot.is_currently_effective(now))
        .filter(|slot| is_within_schedule(slot, now))
        .min_by(|a, b| a.id.cmp(&b.id))
}

/// Finds the schedule slot that authorizes a provider's check-in
pub struct ScheduleResolver {
    store: Arc<dyn Store>,
}

impl ScheduleResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Slots for today's weekday that are currently effective, ordered by id
    pub fn effective_today(
        &self,
        provider_id: &UserId,
        school_id: &SchoolId,
        now: &DateTime<Local>,
    ) -> Result<Vec<ScheduleSlot>> {
        let today = day_of_week(now);
        let mut slots = self.store.find_schedule_slots(provider_id, school_id, today)?;
        slots.retain(|slot| slot.is_currently_effective(now));
        slots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(slots)
    }

    /// The single slot applying at `now`, or `None`
    pub fn resolve(
        &self,
        provider_id: &UserId,
        school_id: &SchoolId,
        now: &DateTime<Local>,
    ) -> Result<Option<ScheduleSlot>> {
        let slots = self.effective_today(provider_id, school_id, now)?;
        let found = select_slot(&slots, now).cloned();

        debug!(
            provider_id = %provider_id,
            school_id = %school_id,
            candidates = slots.len(),
            matched = ?found.as_ref().map(|s| s.id.as_str()),
            "Schedule resolved"
        );

        Ok(found)
    }
}
