use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, QueryBuilder, Row, Sqlite};
use std::path::Path;
use thiserror::Error;
use voucher_core::{ExpenseItem, PersonId, Voucher, VoucherFilter, VoucherId, VoucherStatus};

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Expense items column is not valid JSON: {0}")]
    Items(#[from] serde_json::Error),
    #[error("Unreadable value in column {column}: {value}")]
    BadValue { column: &'static str, value: String },
    #[error("Voucher has not been saved yet")]
    Unsaved,
    #[error("Voucher not found: {0}")]
    NotFound(VoucherId),
}

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    // Expense lines live in a JSON column alongside their voucher.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vouchers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_id INTEGER NOT NULL,
            employee_name TEXT NOT NULL,
            department TEXT NOT NULL DEFAULT '',
            manager_id INTEGER NOT NULL,
            currency TEXT NOT NULL DEFAULT '',
            project_related INTEGER,
            project TEXT,
            voucher_date TEXT NOT NULL,
            expense_items TEXT NOT NULL DEFAULT '[]',
            total_amount TEXT NOT NULL DEFAULT '0.00',
            status TEXT NOT NULL,
            employee_comment TEXT,
            manager_comment TEXT,
            account_comment TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vouchers_employee ON vouchers (employee_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vouchers_status ON vouchers (status, manager_id)")
        .execute(pool)
        .await?;

    Ok(())
}

const VOUCHER_COLUMNS: &str = "id, employee_id, employee_name, department, manager_id, currency, \
     project_related, project, voucher_date, expense_items, status, \
     employee_comment, manager_comment, account_comment";

pub async fn insert_voucher(pool: &DbPool, voucher: &Voucher) -> Result<VoucherId, StorageError> {
    let items = serde_json::to_string(&voucher.items)?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO vouchers (employee_id, employee_name, department, manager_id, currency, \
         project_related, project, voucher_date, expense_items, total_amount, status, \
         employee_comment, manager_comment, account_comment) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(voucher.employee.0)
    .bind(&voucher.employee_name)
    .bind(&voucher.department)
    .bind(voucher.manager.0)
    .bind(&voucher.currency)
    .bind(voucher.project_related)
    .bind(&voucher.project)
    .bind(voucher.voucher_date.to_string())
    .bind(items)
    .bind(voucher.total().to_string())
    .bind(voucher.status.to_string())
    .bind(&voucher.employee_comment)
    .bind(&voucher.manager_comment)
    .bind(&voucher.account_comment)
    .fetch_one(pool)
    .await?;

    tracing::info!(id, status = %voucher.status, "Voucher saved");
    Ok(VoucherId(id))
}

pub async fn update_voucher(pool: &DbPool, voucher: &Voucher) -> Result<(), StorageError> {
    let id = voucher.id.ok_or(StorageError::Unsaved)?;
    let items = serde_json::to_string(&voucher.items)?;
    let result = sqlx::query(
        "UPDATE vouchers SET employee_name = ?, department = ?, manager_id = ?, currency = ?, \
         project_related = ?, project = ?, voucher_date = ?, expense_items = ?, total_amount = ?, \
         status = ?, employee_comment = ?, manager_comment = ?, account_comment = ?, \
         updated_at = datetime('now') WHERE id = ?",
    )
    .bind(&voucher.employee_name)
    .bind(&voucher.department)
    .bind(voucher.manager.0)
    .bind(&voucher.currency)
    .bind(voucher.project_related)
    .bind(&voucher.project)
    .bind(voucher.voucher_date.to_string())
    .bind(items)
    .bind(voucher.total().to_string())
    .bind(voucher.status.to_string())
    .bind(&voucher.employee_comment)
    .bind(&voucher.manager_comment)
    .bind(&voucher.account_comment)
    .bind(id.0)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound(id));
    }
    tracing::info!(id = id.0, status = %voucher.status, "Voucher updated");
    Ok(())
}

pub async fn get_voucher_by_id(pool: &DbPool, id: VoucherId) -> Result<Option<Voucher>, StorageError> {
    let row = sqlx::query(&format!("SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE id = ?"))
        .bind(id.0)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_voucher).transpose()
}

/// Vouchers matching `filter`, newest voucher date first.
///
/// Identity, status and date bounds are applied in SQL; the free-text search
/// over department and project runs on the loaded rows.
pub async fn list_vouchers(pool: &DbPool, filter: &VoucherFilter) -> Result<Vec<Voucher>, StorageError> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE 1 = 1"));
    if let Some(employee) = filter.employee {
        qb.push(" AND employee_id = ").push_bind(employee.0);
    }
    if let Some(manager) = filter.manager {
        qb.push(" AND manager_id = ").push_bind(manager.0);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.to_string());
    }
    if let Some(start) = filter.dates.start {
        qb.push(" AND voucher_date >= ").push_bind(start.to_string());
    }
    if let Some(end) = filter.dates.end {
        qb.push(" AND voucher_date <= ").push_bind(end.to_string());
    }
    qb.push(" ORDER BY voucher_date DESC, id DESC");

    let rows = qb.build().fetch_all(pool).await?;
    let mut vouchers = Vec::with_capacity(rows.len());
    for row in &rows {
        let voucher = row_to_voucher(row)?;
        if filter.matches(&voucher) {
            vouchers.push(voucher);
        }
    }
    Ok(vouchers)
}

/// The manager's approval queue.
pub async fn get_vouchers_pending_for_manager(
    pool: &DbPool,
    manager: PersonId,
) -> Result<Vec<Voucher>, StorageError> {
    let filter = VoucherFilter {
        manager: Some(manager),
        status: Some(VoucherStatus::PendingWithManager),
        ..Default::default()
    };
    list_vouchers(pool, &filter).await
}

/// The accounts team's finalization queue.
pub async fn get_vouchers_pending_for_accounts(pool: &DbPool) -> Result<Vec<Voucher>, StorageError> {
    list_vouchers(pool, &VoucherFilter::default().with_status(VoucherStatus::PendingWithAccount)).await
}

/// Whether any voucher names `person` as its reporting manager.
pub async fn is_reporting_manager(pool: &DbPool, person: PersonId) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM vouchers WHERE manager_id = ? LIMIT 1")
        .bind(person.0)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

fn row_to_voucher(row: &SqliteRow) -> Result<Voucher, StorageError> {
    let date_str: String = row.try_get("voucher_date")?;
    let voucher_date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|_| {
        StorageError::BadValue { column: "voucher_date", value: date_str.clone() }
    })?;
    let status_str: String = row.try_get("status")?;
    let status = status_str
        .parse::<VoucherStatus>()
        .map_err(|_| StorageError::BadValue { column: "status", value: status_str.clone() })?;
    let items_json: String = row.try_get("expense_items")?;
    let items: Vec<ExpenseItem> = serde_json::from_str(&items_json)?;

    Ok(Voucher {
        id: Some(VoucherId(row.try_get("id")?)),
        employee: PersonId(row.try_get("employee_id")?),
        employee_name: row.try_get("employee_name")?,
        department: row.try_get("department")?,
        manager: PersonId(row.try_get("manager_id")?),
        currency: row.try_get("currency")?,
        project_related: row.try_get("project_related")?,
        project: row.try_get("project")?,
        voucher_date,
        items,
        status,
        employee_comment: row.try_get("employee_comment")?,
        manager_comment: row.try_get("manager_comment")?,
        account_comment: row.try_get("account_comment")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use voucher_core::{DateRange, Money};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn voucher(employee: i64, manager: i64, on: NaiveDate, department: &str) -> Voucher {
        let mut v = Voucher::new(PersonId(employee), "Asha", department, PersonId(manager), on);
        v.currency = "INR".to_string();
        v.project_related = Some(false);
        v.items.push(ExpenseItem::new("Travel", "Cab", on, Some("450.00".parse::<Money>().unwrap())));
        v
    }

    async fn test_db() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_db(&dir.path().join("vouchers.db")).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn insert_then_load_roundtrip() {
        let (_dir, pool) = test_db().await;
        let mut v = voucher(1, 2, date(2024, 8, 5), "Engineering");
        v.project_related = Some(true);
        v.project = Some("Apollo".to_string());
        v.employee_comment = Some("client visit".to_string());

        let id = insert_voucher(&pool, &v).await.unwrap();
        let loaded = get_voucher_by_id(&pool, id).await.unwrap().unwrap();

        v.id = Some(id);
        assert_eq!(loaded, v);
        assert!(get_voucher_by_id(&pool, VoucherId(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_persists_status_and_comments() {
        let (_dir, pool) = test_db().await;
        let mut v = voucher(1, 2, date(2024, 8, 5), "Engineering");
        v.id = Some(insert_voucher(&pool, &v).await.unwrap());

        v.status = VoucherStatus::Recycle;
        v.manager_comment = Some("attach the bill".to_string());
        v.apply_scan(0, Some("45.00".parse().unwrap()), Some(date(2024, 8, 1))).unwrap();
        update_voucher(&pool, &v).await.unwrap();

        let loaded = get_voucher_by_id(&pool, v.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(loaded.status, VoucherStatus::Recycle);
        assert_eq!(loaded.manager_comment.as_deref(), Some("attach the bill"));
        assert_eq!(loaded.items[0].amount.unwrap().to_string(), "45.00");
        assert!(loaded.items[0].receipt_scanned);
    }

    #[tokio::test]
    async fn update_requires_saved_voucher() {
        let (_dir, pool) = test_db().await;
        let mut v = voucher(1, 2, date(2024, 8, 5), "Engineering");
        assert!(matches!(update_voucher(&pool, &v).await, Err(StorageError::Unsaved)));
        v.id = Some(VoucherId(42));
        assert!(matches!(update_voucher(&pool, &v).await, Err(StorageError::NotFound(VoucherId(42)))));
    }

    #[tokio::test]
    async fn list_filters_by_employee_status_dates_and_search() {
        let (_dir, pool) = test_db().await;
        insert_voucher(&pool, &voucher(1, 2, date(2024, 7, 1), "Engineering")).await.unwrap();
        insert_voucher(&pool, &voucher(1, 2, date(2024, 8, 1), "Sales")).await.unwrap();
        let mut pending = voucher(1, 2, date(2024, 9, 1), "Engineering");
        pending.status = VoucherStatus::PendingWithManager;
        insert_voucher(&pool, &pending).await.unwrap();
        insert_voucher(&pool, &voucher(5, 2, date(2024, 8, 15), "Engineering")).await.unwrap();

        let mine = list_vouchers(&pool, &VoucherFilter::for_employee(PersonId(1))).await.unwrap();
        assert_eq!(mine.len(), 3);
        // Newest first.
        assert_eq!(mine[0].voucher_date, date(2024, 9, 1));

        let drafts = VoucherFilter::for_employee(PersonId(1)).with_status(VoucherStatus::Draft);
        assert_eq!(list_vouchers(&pool, &drafts).await.unwrap().len(), 2);

        let august = VoucherFilter::default().with_dates(DateRange::new(date(2024, 8, 1), date(2024, 8, 31)));
        assert_eq!(list_vouchers(&pool, &august).await.unwrap().len(), 2);

        let sales = VoucherFilter::for_employee(PersonId(1)).with_search("sAlEs");
        let found = list_vouchers(&pool, &sales).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].department, "Sales");
    }

    #[tokio::test]
    async fn approval_queues() {
        let (_dir, pool) = test_db().await;
        let mut for_ravi = voucher(1, 2, date(2024, 8, 5), "Engineering");
        for_ravi.status = VoucherStatus::PendingWithManager;
        insert_voucher(&pool, &for_ravi).await.unwrap();

        let mut for_other = voucher(4, 7, date(2024, 8, 5), "Sales");
        for_other.status = VoucherStatus::PendingWithManager;
        insert_voucher(&pool, &for_other).await.unwrap();

        let mut for_accounts = voucher(1, 2, date(2024, 8, 6), "Engineering");
        for_accounts.status = VoucherStatus::PendingWithAccount;
        insert_voucher(&pool, &for_accounts).await.unwrap();

        let queue = get_vouchers_pending_for_manager(&pool, PersonId(2)).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].employee, PersonId(1));

        let accounts = get_vouchers_pending_for_accounts(&pool).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].status, VoucherStatus::PendingWithAccount);

        assert!(is_reporting_manager(&pool, PersonId(7)).await.unwrap());
        assert!(!is_reporting_manager(&pool, PersonId(1)).await.unwrap());
    }
}
