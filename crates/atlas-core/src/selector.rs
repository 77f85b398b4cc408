//! # Schedule Auto-Selector
//!
//! Deterministic heuristic that fills a weekly schedule from available
//! slots, honoring the plan's per-day and per-week caps.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Auto-Selection Walkthrough                           │
//! │                                                                         │
//! │  Plan: max_reservations_per_week = 3, max_slots_per_day = 1            │
//! │  Open days: Mon Tue Wed Thu Fri, each with ≥1 reservable slot          │
//! │                                                                         │
//! │  Iterate Weekday::PRIORITY (Mon..Fri, Sat, Sun):                       │
//! │                                                                         │
//! │  Monday    → take min(1, reservable, budget=3) = 1 slot (earliest)     │
//! │  Tuesday   → take 1 slot (budget now 1)                                │
//! │  Wednesday → take 1 slot (budget now 0)                                │
//! │  Thursday  → budget exhausted, STOP                                    │
//! │                                                                         │
//! │  Result: exactly 3 slots, the 3 earliest-available weekdays, each      │
//! │  the earliest-opening reservable slot of its day.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Side-effect free: the output is a proposal. Committing it is the
//! reservation validator's job, and a caller may skip this module entirely
//! by supplying an explicit selection.

use crate::availability::{SlotAvailability, WeekAvailability};
use crate::error::{CoreError, CoreResult};
use crate::types::{Plan, Weekday};

// =============================================================================
// Auto-Selection
// =============================================================================

/// Proposes a weekly schedule for the plan from the availability map.
///
/// Weekdays are visited in fixed priority order (Monday-Friday, then
/// Saturday, Sunday). Within a day, slots are preferred by earliest opening
/// time; the availability map is already sorted that way. Selection stops
/// once `max_reservations_per_week` slots are picked.
///
/// ## Errors
/// Returns [`CoreError::NoSlotsAvailable`] when not a single slot could be
/// selected - a purchase cannot proceed with an empty schedule.
pub fn auto_select(plan: &Plan, week: &WeekAvailability) -> CoreResult<Vec<SlotAvailability>> {
    let mut selected: Vec<SlotAvailability> = Vec::new();

    for weekday in Weekday::PRIORITY {
        let remaining_budget = plan.max_reservations_per_week - selected.len() as i64;
        if remaining_budget <= 0 {
            break;
        }

        let Some(day) = week.day(weekday) else {
            continue;
        };
        if !day.open {
            continue;
        }

        let take = plan.max_slots_per_day.min(remaining_budget).max(0) as usize;
        selected.extend(day.reservable().take(take).cloned());
    }

    if selected.is_empty() {
        return Err(CoreError::NoSlotsAvailable {
            plan_id: plan.id.clone(),
        });
    }

    Ok(selected)
}

// =============================================================================
// Explicit Selection Checks
// =============================================================================

/// Checks a caller-supplied slot selection against the plan's rules.
///
/// This is the pre-mutation half of validation: allowed days, per-day cap,
/// weekly cap, duplicates. Whether the slots still have room is decided
/// later, atomically, by the reservation validator.
pub fn check_explicit_selection(plan: &Plan, selection: &[SlotAvailability]) -> CoreResult<()> {
    let mut per_day: Vec<(Weekday, i64)> = Vec::new();

    for (i, slot) in selection.iter().enumerate() {
        // Duplicate ids would silently consume two capacity units.
        if selection[..i].iter().any(|s| s.slot_id == slot.slot_id) {
            return Err(crate::error::ValidationError::Duplicate {
                field: "slot_ids".to_string(),
                value: slot.slot_id.clone(),
            }
            .into());
        }

        if !plan.allows_day(slot.weekday) {
            return Err(CoreError::DayNotAllowed {
                plan_id: plan.id.clone(),
                weekday: slot.weekday,
            });
        }

        match per_day.iter_mut().find(|(d, _)| *d == slot.weekday) {
            Some((_, count)) => *count += 1,
            None => per_day.push((slot.weekday, 1)),
        }
    }

    if let Some((weekday, count)) = per_day
        .iter()
        .find(|(_, count)| *count > plan.max_slots_per_day)
    {
        return Err(CoreError::SelectionViolatesPlan {
            reason: format!(
                "{count} slots on {weekday}, plan allows {} per day",
                plan.max_slots_per_day
            ),
        });
    }

    if selection.len() as i64 > plan.max_reservations_per_week {
        return Err(CoreError::SelectionViolatesPlan {
            reason: format!(
                "{} slots selected, plan allows {} per week",
                selection.len(),
                plan.max_reservations_per_week
            ),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::week_availability;
    use crate::types::ScheduleSlot;
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

    fn plan(per_day: i64, per_week: i64, allowed: Vec<Weekday>) -> Plan {
        Plan {
            id: "plan-1".to_string(),
            name: "Full Access".to_string(),
            price_cents: 4500,
            allowed_days: allowed,
            max_slots_per_day: per_day,
            max_reservations_per_week: per_week,
            total_capacity: 100,
            member_count: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// 3 per week, 1 per day, 5 open weekdays each with a free slot. Must
    /// select exactly 3 - Mon, Tue, Wed - earliest opener each.
    #[test]
    fn test_selector_bound() {
        let weekdays = [
            Weekday::Monday,
            Weekday::Tuesday,
            Weekday::Wednesday,
            Weekday::Thursday,
            Weekday::Friday,
        ];
        let mut slots = Vec::new();
        for day in weekdays {
            slots.push(slot(&format!("{day}-early"), day, 360, 10, 0));
            slots.push(slot(&format!("{day}-late"), day, 1080, 10, 0));
        }

        let plan = plan(1, 3, weekdays.to_vec());
        let week = week_availability(&plan, &slots);
        let picked = auto_select(&plan, &week).unwrap();

        let ids: Vec<&str> = picked.iter().map(|s| s.slot_id.as_str()).collect();
        assert_eq!(ids, vec!["monday-early", "tuesday-early", "wednesday-early"]);
    }

    #[test]
    fn test_selector_skips_full_days() {
        let plan = plan(1, 2, vec![Weekday::Monday, Weekday::Tuesday, Weekday::Friday]);
        let slots = vec![
            slot("mon", Weekday::Monday, 360, 1, 1), // full
            slot("tue", Weekday::Tuesday, 360, 1, 0),
            slot("fri", Weekday::Friday, 360, 1, 0),
        ];
        let week = week_availability(&plan, &slots);
        let picked = auto_select(&plan, &week).unwrap();

        let ids: Vec<&str> = picked.iter().map(|s| s.slot_id.as_str()).collect();
        assert_eq!(ids, vec!["tue", "fri"]);
    }

    #[test]
    fn test_selector_takes_multiple_per_day_up_to_cap() {
        let plan = plan(2, 3, vec![Weekday::Monday, Weekday::Tuesday]);
        let slots = vec![
            slot("mon-a", Weekday::Monday, 360, 5, 0),
            slot("mon-b", Weekday::Monday, 420, 5, 0),
            slot("mon-c", Weekday::Monday, 480, 5, 0),
            slot("tue-a", Weekday::Tuesday, 360, 5, 0),
        ];
        let week = week_availability(&plan, &slots);
        let picked = auto_select(&plan, &week).unwrap();

        let ids: Vec<&str> = picked.iter().map(|s| s.slot_id.as_str()).collect();
        // 2 on Monday (day cap), then the weekly budget leaves 1 for Tuesday.
        assert_eq!(ids, vec!["mon-a", "mon-b", "tue-a"]);
    }

    #[test]
    fn test_selector_errors_when_nothing_reservable() {
        let plan = plan(1, 3, vec![Weekday::Monday]);
        let slots = vec![slot("mon", Weekday::Monday, 360, 1, 1)];
        let week = week_availability(&plan, &slots);

        assert!(matches!(
            auto_select(&plan, &week),
            Err(CoreError::NoSlotsAvailable { .. })
        ));
    }

    #[test]
    fn test_explicit_selection_rejects_duplicates() {
        let plan = plan(2, 3, vec![Weekday::Monday]);
        let week = week_availability(&plan, &[slot("mon", Weekday::Monday, 360, 5, 0)]);
        let one = week.day(Weekday::Monday).unwrap().slots[0].clone();

        let err = check_explicit_selection(&plan, &[one.clone(), one]).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_explicit_selection_rejects_disallowed_day() {
        let plan = plan(1, 3, vec![Weekday::Monday]);
        let week = week_availability(&plan, &[slot("sun", Weekday::Sunday, 360, 5, 0)]);
        let sunday = week.day(Weekday::Sunday).unwrap().slots[0].clone();

        assert!(matches!(
            check_explicit_selection(&plan, &[sunday]),
            Err(CoreError::DayNotAllowed { .. })
        ));
    }

    #[test]
    fn test_explicit_selection_rejects_over_weekly_cap() {
        let plan = plan(1, 1, vec![Weekday::Monday, Weekday::Tuesday]);
        let week = week_availability(
            &plan,
            &[
                slot("mon", Weekday::Monday, 360, 5, 0),
                slot("tue", Weekday::Tuesday, 360, 5, 0),
            ],
        );
        let mon = week.day(Weekday::Monday).unwrap().slots[0].clone();
        let tue = week.day(Weekday::Tuesday).unwrap().slots[0].clone();

        assert!(matches!(
            check_explicit_selection(&plan, &[mon, tue]),
            Err(CoreError::SelectionViolatesPlan { .. })
        ));
    }
}
