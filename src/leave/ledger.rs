//! Balance bookkeeping. This module is the only writer of
//! `leave_balances` counters; callers run it inside the same transaction as
//! the leave-request write it accompanies.

use serde::Serialize;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::warn;
use utoipa::ToSchema;

use crate::model::{leave_balance::LeaveBalance, leave_type::LeaveType, role::Role};

const BALANCE_COLUMNS: &str =
    "id, user_id, leave_type_id, year, total_days, used_days, pending_days";

/// Fetch the (user, type, year) row with a row lock, creating it with the
/// type's default allocation when absent. Callers must only invoke this for
/// balance-tracked leave types.
pub async fn get_or_create(
    conn: &mut MySqlConnection,
    user_id: u64,
    leave_type: &LeaveType,
    year: i32,
) -> Result<LeaveBalance, sqlx::Error> {
    let sql = format!(
        "SELECT {BALANCE_COLUMNS} FROM leave_balances \
         WHERE user_id = ? AND leave_type_id = ? AND year = ? FOR UPDATE"
    );
    if let Some(balance) = sqlx::query_as::<_, LeaveBalance>(&sql)
        .bind(user_id)
        .bind(leave_type.id)
        .bind(year)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(balance);
    }

    let total_days = leave_type.default_allocation();
    let result = sqlx::query(
        "INSERT INTO leave_balances \
         (user_id, leave_type_id, year, total_days, used_days, pending_days) \
         VALUES (?, ?, ?, ?, 0, 0)",
    )
    .bind(user_id)
    .bind(leave_type.id)
    .bind(year)
    .bind(total_days)
    .execute(&mut *conn)
    .await?;

    Ok(LeaveBalance {
        id: result.last_insert_id(),
        user_id,
        leave_type_id: leave_type.id,
        year,
        total_days,
        used_days: 0,
        pending_days: 0,
    })
}

async fn save_counters(
    conn: &mut MySqlConnection,
    balance: &LeaveBalance,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE leave_balances SET used_days = ?, pending_days = ? WHERE id = ?")
        .bind(balance.used_days)
        .bind(balance.pending_days)
        .bind(balance.id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Reserve days for a newly submitted request.
pub async fn reserve(
    conn: &mut MySqlConnection,
    user_id: u64,
    leave_type: &LeaveType,
    year: i32,
    days: i32,
) -> Result<(), sqlx::Error> {
    let mut balance = get_or_create(conn, user_id, leave_type, year).await?;
    balance.reserve(days);
    save_counters(conn, &balance).await
}

/// Return reserved days on rejection or deletion. A release larger than the
/// outstanding reservation is a data-quality signal, not a failure.
pub async fn release(
    conn: &mut MySqlConnection,
    user_id: u64,
    leave_type: &LeaveType,
    year: i32,
    days: i32,
) -> Result<(), sqlx::Error> {
    let mut balance = get_or_create(conn, user_id, leave_type, year).await?;
    if days > balance.pending_days {
        warn!(
            balance_id = balance.id,
            pending = balance.pending_days,
            days,
            "release exceeds outstanding pending days; flooring at zero"
        );
    }
    balance.release(days);
    save_counters(conn, &balance).await
}

/// Move reserved days into consumed days on approval.
pub async fn commit(
    conn: &mut MySqlConnection,
    user_id: u64,
    leave_type: &LeaveType,
    year: i32,
    days: i32,
) -> Result<(), sqlx::Error> {
    let mut balance = get_or_create(conn, user_id, leave_type, year).await?;
    if days > balance.pending_days {
        warn!(
            balance_id = balance.id,
            pending = balance.pending_days,
            days,
            "commit exceeds outstanding pending days; flooring at zero"
        );
    }
    balance.commit(days);
    save_counters(conn, &balance).await
}

/// Admin override of a single allocation. Returns affected rows so the
/// caller can map 0 to NotFound.
pub async fn set_allocation(
    pool: &MySqlPool,
    balance_id: u64,
    total_days: i32,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE leave_balances SET total_days = ? WHERE id = ?")
        .bind(total_days)
        .bind(balance_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Global leave limits: one set-based upsert over every user holding one of
/// `roles`, creating missing rows with zeroed counters.
pub async fn bulk_set_allocation(
    pool: &MySqlPool,
    leave_type_id: u64,
    total_days: i32,
    year: i32,
    roles: &[Role],
) -> Result<u64, sqlx::Error> {
    if roles.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; roles.len()].join(", ");
    let sql = format!(
        "INSERT INTO leave_balances \
         (user_id, leave_type_id, year, total_days, used_days, pending_days) \
         SELECT u.id, ?, ?, ?, 0, 0 FROM users u WHERE u.role IN ({placeholders}) \
         ON DUPLICATE KEY UPDATE total_days = VALUES(total_days)"
    );
    let mut query = sqlx::query(&sql)
        .bind(leave_type_id)
        .bind(year)
        .bind(total_days);
    for role in roles {
        query = query.bind(role.as_str());
    }
    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// Provision one row per active, balance-tracked leave type for a user who
/// just gained a balance-tracked role. Existing rows are left untouched.
pub async fn provision_for_user(
    conn: &mut MySqlConnection,
    user_id: u64,
    year: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT IGNORE INTO leave_balances \
         (user_id, leave_type_id, year, total_days, used_days, pending_days) \
         SELECT ?, lt.id, ?, COALESCE(lt.max_days_per_year, 0), 0, 0 \
         FROM leave_types lt WHERE lt.is_active = 1 AND lt.has_balance = 1",
    )
    .bind(user_id)
    .bind(year)
    .execute(conn)
    .await?;
    Ok(())
}

/// One balance line per leave type, with a synthesized zero-usage default
/// when no row exists yet.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceSummary {
    #[schema(example = 11, nullable = true)]
    pub balance_id: Option<u64>,
    #[schema(example = 3)]
    pub leave_type_id: u64,
    #[schema(example = "Sick Leave")]
    pub leave_type_name: String,
    #[schema(example = "#FA8C16")]
    pub color: String,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 30)]
    pub total_days: i32,
    #[schema(example = 3)]
    pub used_days: i32,
    #[schema(example = 2)]
    pub pending_days: i32,
    #[schema(example = 25)]
    pub available_days: i32,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    leave_type_id: u64,
    leave_type_name: String,
    color: String,
    max_days_per_year: Option<i32>,
    balance_id: Option<u64>,
    total_days: Option<i32>,
    used_days: Option<i32>,
    pending_days: Option<i32>,
}

/// Balances for every active, balance-tracked leave type for (user, year).
pub async fn balances_with_defaults(
    pool: &MySqlPool,
    user_id: u64,
    year: i32,
) -> Result<Vec<BalanceSummary>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SummaryRow>(
        "SELECT lt.id AS leave_type_id, lt.name AS leave_type_name, lt.color, \
                lt.max_days_per_year, \
                lb.id AS balance_id, lb.total_days, lb.used_days, lb.pending_days \
         FROM leave_types lt \
         LEFT JOIN leave_balances lb \
           ON lb.leave_type_id = lt.id AND lb.user_id = ? AND lb.year = ? \
         WHERE lt.is_active = 1 AND lt.has_balance = 1 \
         ORDER BY lt.name",
    )
    .bind(user_id)
    .bind(year)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let total = row
                .total_days
                .unwrap_or_else(|| row.max_days_per_year.unwrap_or(0));
            let used = row.used_days.unwrap_or(0);
            let pending = row.pending_days.unwrap_or(0);
            BalanceSummary {
                balance_id: row.balance_id,
                leave_type_id: row.leave_type_id,
                leave_type_name: row.leave_type_name,
                color: row.color,
                year,
                total_days: total,
                used_days: used,
                pending_days: pending,
                available_days: (total - used - pending).max(0),
            }
        })
        .collect())
}
