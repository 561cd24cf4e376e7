//! Load Testing Tool
//!
//! Run with: cargo run --bin load_test --release -- --expenses 1000
//!
//! Seeds draft expenses to measure insert throughput, then races two
//! approvers on one submitted expense to show the version predicate picks
//! exactly one winner.

use std::time::Instant;

use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let expense_count: u64 = args
        .iter()
        .position(|a| a == "--expenses")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);

    let database_url = std::env::var("DATABASE_URL")?;

    println!("Load Test - Inserting {} draft expenses", expense_count);
    println!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    let applicant_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO users (email, display_name)
        VALUES ('load@test.local', 'Load Tester')
        ON CONFLICT (email) DO UPDATE SET display_name = EXCLUDED.display_name
        RETURNING id
        "#,
    )
    .fetch_one(&pool)
    .await?;

    let start = Instant::now();
    let mut success_count = 0u64;

    for i in 0..expense_count {
        let result = sqlx::query(
            r#"
            INSERT INTO expenses
                (applicant_id, title, amount, currency, status,
                 submitted_at, created_at, updated_at, version)
            VALUES ($1, $2, 1200.00, 'JPY', 'DRAFT', NULL, NOW(), NOW(), 0)
            "#,
        )
        .bind(applicant_id)
        .bind(format!("load-test expense {i}"))
        .execute(&pool)
        .await;

        if result.is_ok() {
            success_count += 1;
        }

        if (i + 1) % 1000 == 0 {
            println!("Inserted {} expenses...", i + 1);
        }
    }

    let elapsed = start.elapsed();
    println!(
        "Inserted {}/{} expenses in {:.2}s ({:.0} rows/s)",
        success_count,
        expense_count,
        elapsed.as_secs_f64(),
        success_count as f64 / elapsed.as_secs_f64()
    );

    // Contention check: two approvers, one version token, one winner
    let contended_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO expenses
            (applicant_id, title, amount, currency, status,
             submitted_at, created_at, updated_at, version)
        VALUES ($1, 'contended expense', 5000.00, 'JPY', 'SUBMITTED', NOW(), NOW(), NOW(), 1)
        RETURNING id
        "#,
    )
    .bind(applicant_id)
    .fetch_one(&pool)
    .await?;

    println!("Racing two approvals on expense {contended_id} at version 1...");

    let approve = |pool: sqlx::PgPool| async move {
        sqlx::query(
            r#"
            UPDATE expenses
            SET status = 'APPROVED', updated_at = NOW(), version = 2
            WHERE id = $1 AND version = 1
            "#,
        )
        .bind(contended_id)
        .execute(&pool)
        .await
        .map(|r| r.rows_affected())
    };

    let (a, b) = tokio::join!(approve(pool.clone()), approve(pool.clone()));
    let winners = a.unwrap_or(0) + b.unwrap_or(0);

    println!("Winners: {winners} (expected exactly 1)");
    assert_eq!(winners, 1, "version predicate must admit exactly one writer");

    Ok(())
}
