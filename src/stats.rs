//! Monthly statistics aggregation
//!
//! Pure computation over a user's income, savings goal and the expenses
//! dated within the current calendar month. The month window is anchored
//! in UTC so results do not depend on server locale.

use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::models::{Expense, StatisticsSnapshot};

/// First instant of `now`'s calendar month, in UTC.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now
        .date_naive()
        .with_day(1)
        .expect("day 1 is valid for every month");
    let midnight = first
        .and_hms_opt(0, 0, 0)
        .expect("midnight is valid for every date");
    Utc.from_utc_datetime(&midnight)
}

/// True when `at` falls inside the in-month window `[month_start(now), now]`.
pub fn in_current_month(at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    at >= month_start(now) && at <= now
}

/// Aggregates the given in-month expenses into a statistics snapshot.
///
/// Pure: never mutates the expense slice, identical inputs yield identical
/// snapshots. Negative or non-finite income/goal values are clamped to zero
/// before use; a zero or negative goal is defined as 0% completion rather
/// than a division error.
pub fn compute_snapshot(income: f64, goal: f64, expenses: &[Expense]) -> StatisticsSnapshot {
    let income = sanitize(income);
    let goal = sanitize(goal);

    let mut total_expenses = 0.0;
    let mut category_totals = std::collections::BTreeMap::new();
    for expense in expenses {
        total_expenses += expense.amount;
        *category_totals.entry(expense.category.clone()).or_insert(0.0) += expense.amount;
    }

    let saved_amount = (income - total_expenses).max(0.0);
    let goal_percentage = if goal <= 0.0 {
        0.0
    } else {
        (saved_amount / goal * 100.0).min(100.0)
    };

    StatisticsSnapshot {
        monthly_income: income,
        savings_goal: goal,
        total_expenses,
        saved_amount,
        goal_percentage,
        category_totals,
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn expense(amount: f64, category: &str) -> Expense {
        Expense::new(
            Uuid::new_v4(),
            "test expense".to_string(),
            amount,
            Some(category.to_string()),
            None,
        )
    }

    #[test]
    fn test_capped_goal_percentage() {
        let expenses = vec![expense(10000.0, "food")];
        let snapshot = compute_snapshot(50000.0, 20000.0, &expenses);

        assert_eq!(snapshot.total_expenses, 10000.0);
        assert_eq!(snapshot.saved_amount, 40000.0);
        // 40000 / 20000 * 100 = 200, capped at 100
        assert_eq!(snapshot.goal_percentage, 100.0);
        assert_eq!(snapshot.category_totals.get("food"), Some(&10000.0));
    }

    #[test]
    fn test_empty_everything() {
        let snapshot = compute_snapshot(0.0, 0.0, &[]);

        assert_eq!(snapshot.total_expenses, 0.0);
        assert_eq!(snapshot.saved_amount, 0.0);
        assert_eq!(snapshot.goal_percentage, 0.0);
        assert!(snapshot.category_totals.is_empty());
    }

    #[test]
    fn test_empty_expenses_save_full_income() {
        let snapshot = compute_snapshot(30000.0, 15000.0, &[]);

        assert_eq!(snapshot.saved_amount, 30000.0);
        assert_eq!(snapshot.goal_percentage, 100.0);
    }

    #[test]
    fn test_overspending_clamps_saved_amount() {
        let expenses = vec![expense(8000.0, "rent"), expense(4000.0, "food")];
        let snapshot = compute_snapshot(10000.0, 5000.0, &expenses);

        assert_eq!(snapshot.total_expenses, 12000.0);
        assert_eq!(snapshot.saved_amount, 0.0);
        assert_eq!(snapshot.goal_percentage, 0.0);
    }

    #[test]
    fn test_negative_inputs_treated_as_zero() {
        let snapshot = compute_snapshot(-5000.0, -100.0, &[]);

        assert_eq!(snapshot.monthly_income, 0.0);
        assert_eq!(snapshot.savings_goal, 0.0);
        assert_eq!(snapshot.saved_amount, 0.0);
        assert_eq!(snapshot.goal_percentage, 0.0);
    }

    #[test]
    fn test_goal_percentage_always_in_range() {
        let cases = [
            (0.0, 0.0),
            (1000.0, -50.0),
            (1000.0, 0.0),
            (1000.0, 1.0),
            (1000.0, 100000.0),
            (0.0, 500.0),
        ];
        for (income, goal) in cases {
            let snapshot = compute_snapshot(income, goal, &[expense(250.0, "misc")]);
            assert!(
                (0.0..=100.0).contains(&snapshot.goal_percentage),
                "percentage out of range for income={} goal={}",
                income,
                goal
            );
        }
    }

    #[test]
    fn test_aggregation_is_idempotent_and_pure() {
        let expenses = vec![expense(100.0, "food"), expense(50.0, "transport")];
        let before: Vec<f64> = expenses.iter().map(|e| e.amount).collect();

        let first = compute_snapshot(2000.0, 500.0, &expenses);
        let second = compute_snapshot(2000.0, 500.0, &expenses);

        assert_eq!(first, second);
        let after: Vec<f64> = expenses.iter().map(|e| e.amount).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_category_totals_cover_exactly_present_categories() {
        let expenses = vec![
            expense(100.0, "food"),
            expense(40.0, "food"),
            expense(60.0, "transport"),
        ];
        let snapshot = compute_snapshot(1000.0, 0.0, &expenses);

        assert_eq!(snapshot.category_totals.len(), 2);
        assert_eq!(snapshot.category_totals.get("food"), Some(&140.0));
        assert_eq!(snapshot.category_totals.get("transport"), Some(&60.0));
    }

    #[test]
    fn test_month_window() {
        let now = Utc.with_ymd_and_hms(2025, 3, 15, 12, 30, 0).unwrap();
        let start = month_start(now);

        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
        assert!(in_current_month(start, now));
        assert!(in_current_month(now, now));
        assert!(!in_current_month(start - Duration::seconds(1), now));
        assert!(!in_current_month(now + Duration::seconds(1), now));
    }
}
