//! Store Integration Tests
//!
//! Store-level properties against a live database: insert round-trips,
//! version-predicated updates under contention, audit ordering and
//! criteria filtering.

use chrono::Utc;
use rust_decimal::Decimal;

use expense_flow::domain::{
    DomainError, ExpenseStatus, NewExpense, RequestContext, Role, VisibilityFilter,
};
use expense_flow::handlers::{
    ApproveExpenseCommand, ApproveExpenseHandler, CreateExpenseCommand, CreateExpenseHandler,
    SubmitExpenseCommand, SubmitExpenseHandler,
};
use expense_flow::store::{
    AuditStore, ExpenseStore, NewAuditEntry, PageSpec, SearchCriteria, SortSpec, UpdateOutcome,
};

mod common;

use common::{APPROVER_X, APPROVER_Y, USER_A, USER_B};

fn applicant_ctx(actor_id: i64) -> RequestContext {
    RequestContext::new(actor_id, vec![Role::Applicant], "trace-store-test")
}

fn approver_ctx(actor_id: i64) -> RequestContext {
    RequestContext::new(actor_id, vec![Role::Approver], "trace-store-test")
}

/// Create and submit one expense through the real handlers; returns its id.
async fn submitted_expense(pool: &sqlx::PgPool, applicant_id: i64) -> i64 {
    let bus = common::quiet_bus();
    let create = CreateExpenseHandler::new(pool.clone(), bus.clone());
    let submit = SubmitExpenseHandler::new(pool.clone(), bus);

    let expense = create
        .execute(
            CreateExpenseCommand::new("Taxi".to_string(), Decimal::new(1200, 0)),
            &applicant_ctx(applicant_id),
        )
        .await
        .expect("create failed");

    submit
        .execute(
            SubmitExpenseCommand::new(expense.id()),
            &applicant_ctx(applicant_id),
        )
        .await
        .expect("submit failed");

    expense.id()
}

#[tokio::test]
async fn test_insert_find_round_trip() {
    let pool = common::setup_test_db().await;
    let store = ExpenseStore::new(pool.clone());

    let now = Utc::now();
    let draft = NewExpense::new(USER_A, "Taxi", Decimal::new(1200, 0), Some("USD"), now).unwrap();

    let mut tx = pool.begin().await.unwrap();
    let inserted = store.insert(&mut tx, draft).await.unwrap();
    tx.commit().await.unwrap();

    let found = store
        .find_by_id(inserted.id())
        .await
        .unwrap()
        .expect("inserted expense must be readable");

    assert_eq!(found.id(), inserted.id());
    assert_eq!(found.applicant_id(), USER_A);
    assert_eq!(found.title(), "Taxi");
    assert_eq!(found.amount().value(), Decimal::new(120000, 2));
    assert_eq!(found.currency().as_str(), "USD");
    assert_eq!(found.status(), ExpenseStatus::Draft);
    assert_eq!(found.version(), 0);
    assert!(found.submitted_at().is_none());
}

#[tokio::test]
async fn test_find_missing_returns_none() {
    let pool = common::setup_test_db().await;
    let store = ExpenseStore::new(pool);

    assert!(store.find_by_id(424242).await.unwrap().is_none());
}

#[tokio::test]
async fn test_conditional_update_applies_once() {
    let pool = common::setup_test_db().await;
    let store = ExpenseStore::new(pool.clone());
    let expense_id = submitted_expense(&pool, USER_A).await;

    let current = store.find_by_id(expense_id).await.unwrap().unwrap();
    assert_eq!(current.version(), 1);
    let post = current.approve(Utc::now()).unwrap();

    // First writer at version 1 wins
    let mut tx = pool.begin().await.unwrap();
    let outcome = store
        .conditional_update(&mut tx, expense_id, current.version(), &post)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Applied);

    let stored = store.find_by_id(expense_id).await.unwrap().unwrap();
    assert_eq!(stored.status(), ExpenseStatus::Approved);
    assert_eq!(stored.version(), 2);

    // Second writer with the stale version loses and writes nothing
    let mut tx = pool.begin().await.unwrap();
    let outcome = store
        .conditional_update(&mut tx, expense_id, current.version(), &post)
        .await
        .unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(outcome, UpdateOutcome::VersionMismatch);

    let stored = store.find_by_id(expense_id).await.unwrap().unwrap();
    assert_eq!(stored.version(), 2);
}

#[tokio::test]
async fn test_concurrent_approvals_have_exactly_one_winner() {
    let pool = common::setup_test_db().await;
    let expense_id = submitted_expense(&pool, USER_A).await;

    let bus = common::quiet_bus();
    let handler_x = ApproveExpenseHandler::new(pool.clone(), bus.clone());
    let handler_y = ApproveExpenseHandler::new(pool.clone(), bus);

    // Both approvers fetched version 1 and race to commit
    let ctx_x = approver_ctx(APPROVER_X);
    let ctx_y = approver_ctx(APPROVER_Y);
    let (x, y) = tokio::join!(
        handler_x.execute(
            ApproveExpenseCommand::new(expense_id, 1),
            &ctx_x,
        ),
        handler_y.execute(
            ApproveExpenseCommand::new(expense_id, 1),
            &ctx_y,
        ),
    );

    let winners = [&x, &y].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one approval must win");

    // The loser always sees a conflict, whether it lost at the pre-read
    // version gate or at the commit-time predicate
    let loser = if x.is_err() { x.unwrap_err() } else { y.unwrap_err() };
    assert!(matches!(loser, DomainError::Conflict { .. }), "loser saw {loser:?}");

    // One APPROVE audit row, final version 2
    let audit = AuditStore::new(pool.clone());
    let entries = audit.find_by_expense(expense_id).await.unwrap();
    let approvals = entries
        .iter()
        .filter(|e| e.action.as_str() == "APPROVE")
        .count();
    assert_eq!(approvals, 1);

    let stored = ExpenseStore::new(pool)
        .find_by_id(expense_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status(), ExpenseStatus::Approved);
    assert_eq!(stored.version(), 2);
}

#[tokio::test]
async fn test_audit_entries_keep_transition_order() {
    let pool = common::setup_test_db().await;
    let store = ExpenseStore::new(pool.clone());
    let audit = AuditStore::new(pool.clone());

    let now = Utc::now();
    let draft = NewExpense::new(USER_A, "Taxi", Decimal::new(500, 0), None, now).unwrap();

    let mut tx = pool.begin().await.unwrap();
    let expense = store.insert(&mut tx, draft).await.unwrap();
    audit
        .append(&mut tx, &NewAuditEntry::created(expense.id(), USER_A, "t1", now))
        .await
        .unwrap();
    audit
        .append(&mut tx, &NewAuditEntry::submitted(expense.id(), USER_A, "t2", now))
        .await
        .unwrap();
    audit
        .append(
            &mut tx,
            &NewAuditEntry::rejected(expense.id(), APPROVER_X, "too vague", "t3", now),
        )
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let entries = audit.find_by_expense(expense.id()).await.unwrap();
    let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["CREATE", "SUBMIT", "REJECT"]);

    // The after-status sequence is the observable status history
    let history: Vec<&str> = entries
        .iter()
        .map(|e| e.after_status.as_str())
        .collect();
    assert_eq!(history, vec!["DRAFT", "SUBMITTED", "REJECTED"]);
    assert_eq!(entries[2].note.as_deref(), Some("too vague"));

    // Ids ascend within equal timestamps
    assert!(entries.windows(2).all(|w| w[0].id < w[1].id));
}

#[tokio::test]
async fn test_search_filters_and_visibility() {
    let pool = common::setup_test_db().await;
    let store = ExpenseStore::new(pool.clone());

    let now = Utc::now();
    let mut tx = pool.begin().await.unwrap();
    for (applicant, title, amount) in [
        (USER_A, "Taxi to airport", 1200),
        (USER_A, "Hotel", 20000),
        (USER_B, "taxi downtown", 900),
    ] {
        let draft =
            NewExpense::new(applicant, title, Decimal::new(amount, 0), None, now).unwrap();
        store.insert(&mut tx, draft).await.unwrap();
    }
    tx.commit().await.unwrap();

    // Title matching is a case-insensitive substring
    let criteria = SearchCriteria {
        title: Some("TAXI".to_string()),
        ..Default::default()
    };
    let (items, total) = store
        .search(
            &criteria,
            VisibilityFilter::Unrestricted,
            SortSpec::normalize(Some("amount,asc")),
            PageSpec::new(0, 10),
        )
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert!(items[0].amount().value() < items[1].amount().value());

    // Visibility pins a role-less actor to their own rows
    let (items, total) = store
        .search(
            &SearchCriteria::default(),
            VisibilityFilter::ApplicantOnly(USER_B),
            SortSpec::default(),
            PageSpec::new(0, 10),
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert!(items.iter().all(|e| e.applicant_id() == USER_B));

    // Amount range is inclusive
    let criteria = SearchCriteria {
        amount_min: Some(Decimal::new(900, 0)),
        amount_max: Some(Decimal::new(1200, 0)),
        ..Default::default()
    };
    let (_, total) = store
        .search(
            &criteria,
            VisibilityFilter::Unrestricted,
            SortSpec::default(),
            PageSpec::new(0, 10),
        )
        .await
        .unwrap();
    assert_eq!(total, 2);

    // Status filter
    let criteria = SearchCriteria {
        status: Some(ExpenseStatus::Submitted),
        ..Default::default()
    };
    let (_, total) = store
        .search(
            &criteria,
            VisibilityFilter::Unrestricted,
            SortSpec::default(),
            PageSpec::new(0, 10),
        )
        .await
        .unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_rollback_discards_expense_and_audit_row() {
    let pool = common::setup_test_db().await;
    let store = ExpenseStore::new(pool.clone());
    let audit = AuditStore::new(pool.clone());

    let now = Utc::now();
    let draft = NewExpense::new(USER_A, "Taxi", Decimal::new(700, 0), None, now).unwrap();

    let mut tx = pool.begin().await.unwrap();
    let expense = store.insert(&mut tx, draft).await.unwrap();
    audit
        .append(&mut tx, &NewAuditEntry::created(expense.id(), USER_A, "t", now))
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    assert!(store.find_by_id(expense.id()).await.unwrap().is_none());
    assert!(audit.find_by_expense(expense.id()).await.unwrap().is_empty());
}
