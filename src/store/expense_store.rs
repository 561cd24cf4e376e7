//! Expense Store
//!
//! Durable persistence of expenses with version-conditional updates.
//! Optimistic locking: no row locks are held across the read-then-update
//! gap; the version predicate in the UPDATE decides the winner.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::fmt;

use crate::domain::{Amount, Currency, DomainError, Expense, ExpenseStatus, NewExpense};
use crate::domain::VisibilityFilter;

/// Row shape shared by every expense SELECT
type ExpenseRow = (
    i64,
    i64,
    String,
    Decimal,
    String,
    String,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
    DateTime<Utc>,
    i32,
);

const SELECT_COLUMNS: &str = "id, applicant_id, title, amount, currency, status, \
     submitted_at, created_at, updated_at, version";

/// Outcome of a version-conditional update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The row matched the expected version and now carries `expected + 1`
    Applied,
    /// Another writer committed first; nothing was written
    VersionMismatch,
}

/// Search criteria. Absent fields are unrestricted.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub applicant_id: Option<i64>,
    pub status: Option<ExpenseStatus>,
    /// Case-insensitive substring match on title
    pub title: Option<String>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
    /// Inclusive date range on submitted_at
    pub submitted_from: Option<NaiveDate>,
    pub submitted_to: Option<NaiveDate>,
}

/// Sortable columns: a compile-time closed set. Anything outside it
/// normalises to `created_at`, which also closes the order-by injection
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    CreatedAt,
    UpdatedAt,
    SubmittedAt,
    Amount,
    Id,
}

impl SortColumn {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortColumn::CreatedAt => "created_at",
            SortColumn::UpdatedAt => "updated_at",
            SortColumn::SubmittedAt => "submitted_at",
            SortColumn::Amount => "amount",
            SortColumn::Id => "id",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "created_at" => Some(SortColumn::CreatedAt),
            "updated_at" => Some(SortColumn::UpdatedAt),
            "submitted_at" => Some(SortColumn::SubmittedAt),
            "amount" => Some(SortColumn::Amount),
            "id" => Some(SortColumn::Id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Validated sort specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Normalise a raw `"column,direction"` value against the closed set.
    /// Malformed or unknown input silently falls back to `(created_at, DESC)`.
    pub fn normalize(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };

        let mut parts = raw.split(',');
        let column = parts
            .next()
            .and_then(|p| SortColumn::parse(p.trim()))
            .unwrap_or(SortColumn::CreatedAt);
        let direction = match parts.next().map(str::trim) {
            Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        };

        Self { column, direction }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            column: SortColumn::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column.as_sql(), self.direction.as_sql())
    }
}

/// Offset/limit page. `limit` is always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    offset: i64,
    limit: i64,
}

impl PageSpec {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset: offset.max(0),
            limit: limit.max(1),
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }
}

/// Expense persistence over PostgreSQL
#[derive(Debug, Clone)]
pub struct ExpenseStore {
    pool: PgPool,
}

impl ExpenseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a draft inside the caller's transaction and return the
    /// expense with its assigned id (status DRAFT, version 0).
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        draft: NewExpense,
    ) -> Result<Expense, DomainError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO expenses
                (applicant_id, title, amount, currency, status,
                 submitted_at, created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, NULL, $6, $6, 0)
            RETURNING id
            "#,
        )
        .bind(draft.applicant_id())
        .bind(draft.title())
        .bind(draft.amount().value())
        .bind(draft.currency().as_str())
        .bind(ExpenseStatus::Draft.as_str())
        .bind(draft.created_at())
        .fetch_one(&mut **tx)
        .await?;

        Ok(Expense::from_inserted(draft, id))
    }

    /// Fetch the full current state including version.
    pub async fn find_by_id(&self, expense_id: i64) -> Result<Option<Expense>, DomainError> {
        let row: Option<ExpenseRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM expenses WHERE id = $1"
        ))
        .bind(expense_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_row).transpose()
    }

    /// Re-read inside an open transaction (used to classify a version
    /// mismatch without racing yet another writer).
    pub async fn find_by_id_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        expense_id: i64,
    ) -> Result<Option<Expense>, DomainError> {
        let row: Option<ExpenseRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM expenses WHERE id = $1"
        ))
        .bind(expense_id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(map_row).transpose()
    }

    /// Apply the post-image only if the row still carries `expected_version`.
    ///
    /// On success the persisted version is `expected_version + 1`, bound as
    /// an explicit value from the post-image. For any pair of concurrent
    /// attempts with the same expected version, exactly one sees `Applied`.
    pub async fn conditional_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        expense_id: i64,
        expected_version: i32,
        post: &Expense,
    ) -> Result<UpdateOutcome, DomainError> {
        debug_assert_eq!(post.version(), expected_version + 1);

        let result = sqlx::query(
            r#"
            UPDATE expenses
            SET status = $1,
                submitted_at = $2,
                updated_at = $3,
                version = $4
            WHERE id = $5
              AND version = $6
            "#,
        )
        .bind(post.status().as_str())
        .bind(post.submitted_at())
        .bind(post.updated_at())
        .bind(post.version())
        .bind(expense_id)
        .bind(expected_version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 1 {
            Ok(UpdateOutcome::Applied)
        } else {
            Ok(UpdateOutcome::VersionMismatch)
        }
    }

    /// Page of expenses plus the total count under the same filter.
    pub async fn search(
        &self,
        criteria: &SearchCriteria,
        visibility: VisibilityFilter,
        sort: SortSpec,
        page: PageSpec,
    ) -> Result<(Vec<Expense>, i64), DomainError> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM expenses");
        push_filters(&mut count_qb, criteria, visibility);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM expenses"));
        push_filters(&mut qb, criteria, visibility);
        qb.push(" ORDER BY ")
            .push(sort.column.as_sql())
            .push(" ")
            .push(sort.direction.as_sql());
        qb.push(" LIMIT ").push_bind(page.limit());
        qb.push(" OFFSET ").push_bind(page.offset());

        let rows: Vec<ExpenseRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let items = rows.into_iter().map(map_row).collect::<Result<_, _>>()?;

        Ok((items, total))
    }
}

/// Append the WHERE clause shared by the page and count queries.
fn push_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    criteria: &SearchCriteria,
    visibility: VisibilityFilter,
) {
    qb.push(" WHERE 1 = 1");

    if let VisibilityFilter::ApplicantOnly(actor_id) = visibility {
        qb.push(" AND applicant_id = ").push_bind(actor_id);
    }
    if let Some(applicant_id) = criteria.applicant_id {
        qb.push(" AND applicant_id = ").push_bind(applicant_id);
    }
    if let Some(status) = criteria.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(title) = criteria.title.as_deref().filter(|t| !t.trim().is_empty()) {
        qb.push(" AND title ILIKE ")
            .push_bind(format!("%{}%", escape_like(title.trim())));
    }
    if let Some(min) = criteria.amount_min {
        qb.push(" AND amount >= ").push_bind(min);
    }
    if let Some(max) = criteria.amount_max {
        qb.push(" AND amount <= ").push_bind(max);
    }
    if let Some(from) = criteria.submitted_from {
        qb.push(" AND submitted_at >= ")
            .push_bind(from.and_time(NaiveTime::MIN).and_utc());
    }
    if let Some(to) = criteria.submitted_to {
        // inclusive upper bound: strictly before the following midnight
        let upper = (to + chrono::Days::new(1)).and_time(NaiveTime::MIN).and_utc();
        qb.push(" AND submitted_at < ").push_bind(upper);
    }
}

/// Escape LIKE metacharacters so user input only ever matches literally.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn map_row(row: ExpenseRow) -> Result<Expense, DomainError> {
    let (id, applicant_id, title, amount, currency, status, submitted_at, created_at, updated_at, version) =
        row;

    let amount = Amount::new(amount).map_err(|e| DomainError::Storage {
        retryable: false,
        message: format!("expense {id} has invalid amount: {e}"),
    })?;
    let currency = Currency::new(currency).map_err(|e| DomainError::Storage {
        retryable: false,
        message: format!("expense {id} has invalid currency: {e}"),
    })?;
    let status: ExpenseStatus = status.parse().map_err(|e| DomainError::Storage {
        retryable: false,
        message: format!("expense {id}: {e}"),
    })?;

    Ok(Expense::restore(
        id,
        applicant_id,
        title,
        amount,
        currency,
        status,
        submitted_at,
        created_at,
        updated_at,
        version,
    ))
}
