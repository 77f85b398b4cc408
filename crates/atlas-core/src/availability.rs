//! # Slot Availability Calculator
//!
//! Pure computation of "which slots can this plan reserve right now".
//!
//! ## Where This Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Membership Purchase Data Flow                           │
//! │                                                                         │
//! │  ScheduleSlot rows (committed reserved_count, read fresh from db)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  week_availability(plan, slots)  ← THIS MODULE (pure, no I/O)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  WeekAvailability ──► auto_select() or client-supplied selection       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Reservation validator (atomic check-then-commit, atlas-db)            │
//! │                                                                         │
//! │  The numbers here are advisory: the validator re-checks everything     │
//! │  inside its transaction, so a stale read can never over-book.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{Plan, ScheduleSlot, Weekday};

// =============================================================================
// Availability Types
// =============================================================================

/// One slot's availability as seen by a specific plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub slot_id: String,
    pub weekday: Weekday,
    /// Opening time as minutes since midnight.
    pub opens_at_min: i64,
    pub closes_at_min: i64,
    pub capacity: i64,
    /// `capacity - reserved_count`, clamped at zero.
    pub available: i64,
    /// `available > 0` AND the weekday is in the plan's allowed days.
    pub can_reserve: bool,
}

/// All slots of one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAvailability {
    pub weekday: Weekday,
    /// Whether the plan allows this weekday at all.
    pub open: bool,
    /// Slots sorted ascending by opening time (ties by slot id).
    pub slots: Vec<SlotAvailability>,
}

impl DayAvailability {
    /// Slots that can actually be reserved on this day.
    pub fn reservable(&self) -> impl Iterator<Item = &SlotAvailability> {
        self.slots.iter().filter(|s| s.can_reserve)
    }
}

/// Availability for the whole weekly template, one entry per weekday in
/// calendar order (Monday first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekAvailability {
    pub days: Vec<DayAvailability>,
}

impl WeekAvailability {
    /// The entry for a given weekday.
    pub fn day(&self, weekday: Weekday) -> Option<&DayAvailability> {
        self.days.iter().find(|d| d.weekday == weekday)
    }
}

// =============================================================================
// Calculator
// =============================================================================

/// Builds the weekly availability map for a plan from the current committed
/// slot rows.
///
/// Pure read: no side effects, deterministic for a given input. Days the
/// plan does not allow still appear (with `open = false` and every slot
/// `can_reserve = false`) so callers can render the full week.
pub fn week_availability(plan: &Plan, slots: &[ScheduleSlot]) -> WeekAvailability {
    let days = Weekday::ALL
        .into_iter()
        .map(|weekday| {
            let open = plan.allows_day(weekday);

            let mut day_slots: Vec<SlotAvailability> = slots
                .iter()
                .filter(|s| s.weekday == weekday)
                .map(|s| {
                    let available = s.available();
                    SlotAvailability {
                        slot_id: s.id.clone(),
                        weekday,
                        opens_at_min: s.opens_at_min,
                        closes_at_min: s.closes_at_min,
                        capacity: s.capacity,
                        available,
                        can_reserve: open && available > 0,
                    }
                })
                .collect();

            // Deterministic ordering: earliest opening first, id breaks ties.
            day_slots.sort_by(|a, b| {
                a.opens_at_min
                    .cmp(&b.opens_at_min)
                    .then_with(|| a.slot_id.cmp(&b.slot_id))
            });

            DayAvailability {
                weekday,
                open,
                slots: day_slots,
            }
        })
        .collect();

    WeekAvailability { days }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn slot(id: &str, weekday: Weekday, opens: i64, capacity: i64, reserved: i64) -> ScheduleSlot {
        ScheduleSlot {
            id: id.to_string(),
            weekday,
            opens_at_min: opens,
            closes_at_min: opens + 60,
            capacity,
            reserved_count: reserved,
            created_at: Utc::now(),
        }
    }

    fn plan(allowed: Vec<Weekday>) -> Plan {
        Plan {
            id: "plan-1".to_string(),
            name: "Full Access".to_string(),
            price_cents: 4500,
            allowed_days: allowed,
            max_slots_per_day: 1,
            max_reservations_per_week: 3,
            total_capacity: 100,
            member_count: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_available_is_capacity_minus_reserved() {
        let plan = plan(vec![Weekday::Monday]);
        let slots = vec![slot("s1", Weekday::Monday, 360, 10, 7)];

        let week = week_availability(&plan, &slots);
        let monday = week.day(Weekday::Monday).unwrap();
        assert!(monday.open);
        assert_eq!(monday.slots[0].available, 3);
        assert!(monday.slots[0].can_reserve);
    }

    #[test]
    fn test_full_slot_cannot_be_reserved() {
        let plan = plan(vec![Weekday::Monday]);
        let slots = vec![slot("s1", Weekday::Monday, 360, 10, 10)];

        let week = week_availability(&plan, &slots);
        let monday = week.day(Weekday::Monday).unwrap();
        assert_eq!(monday.slots[0].available, 0);
        assert!(!monday.slots[0].can_reserve);
    }

    #[test]
    fn test_disallowed_day_is_closed() {
        let plan = plan(vec![Weekday::Monday]);
        let slots = vec![slot("s1", Weekday::Tuesday, 360, 10, 0)];

        let week = week_availability(&plan, &slots);
        let tuesday = week.day(Weekday::Tuesday).unwrap();
        assert!(!tuesday.open);
        // Room exists but the plan doesn't allow the day.
        assert_eq!(tuesday.slots[0].available, 10);
        assert!(!tuesday.slots[0].can_reserve);
    }

    #[test]
    fn test_slots_sorted_by_opening_time() {
        let plan = plan(vec![Weekday::Monday]);
        let slots = vec![
            slot("late", Weekday::Monday, 1080, 10, 0),
            slot("early", Weekday::Monday, 360, 10, 0),
            slot("noon", Weekday::Monday, 720, 10, 0),
        ];

        let week = week_availability(&plan, &slots);
        let ids: Vec<&str> = week
            .day(Weekday::Monday)
            .unwrap()
            .slots
            .iter()
            .map(|s| s.slot_id.as_str())
            .collect();
        assert_eq!(ids, vec!["early", "noon", "late"]);
    }

    #[test]
    fn test_all_seven_days_present() {
        let plan = plan(vec![Weekday::Monday]);
        let week = week_availability(&plan, &[]);
        assert_eq!(week.days.len(), 7);
        assert_eq!(week.days[0].weekday, Weekday::Monday);
        assert_eq!(week.days[6].weekday, Weekday::Sunday);
    }
}
