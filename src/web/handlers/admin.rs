//! # Admin Statistics Handlers
//!
//! Sales reporting for superusers. Only `completed` purchases count.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use crate::constants::stats::{DEFAULT_DAYS, DEFAULT_TOP_LIMIT};
use crate::models::purchase::{SaleRecord, TopBook};
use crate::models::{Book, Purchase, User};
use crate::web::errors::ApiResult;
use crate::web::extractors::{AdminUser, ValidatedQuery};
use crate::web::state::AppState;

fn default_days() -> u32 {
    DEFAULT_DAYS
}

fn default_limit() -> u32 {
    DEFAULT_TOP_LIMIT
}

#[derive(Debug, Deserialize, Validate)]
pub struct SalesQuery {
    #[serde(default = "default_days")]
    #[validate(range(min = 1, max = 90))]
    pub days: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TopBooksQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 50))]
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub count: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesSummary {
    pub revenue_cents: i64,
    pub users: i64,
    pub books: i64,
    pub purchases: i64,
}

/// Group sales by UTC calendar day, oldest day first. Days without sales
/// are omitted.
pub fn bucket_sales_by_day(records: &[SaleRecord]) -> Vec<DailySales> {
    let mut days: Vec<DailySales> = Vec::new();
    let mut sorted: Vec<&SaleRecord> = records.iter().collect();
    sorted.sort_by_key(|record| record.created_at);

    for record in sorted {
        let date = record.created_at.date_naive();
        match days.last_mut() {
            Some(day) if day.date == date => {
                day.count += 1;
                day.revenue_cents += record.price_cents;
            }
            _ => days.push(DailySales {
                date,
                count: 1,
                revenue_cents: record.price_cents,
            }),
        }
    }

    days
}

/// Midnight UTC opening a window of `days` calendar days that ends today.
pub fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    today - Duration::days(i64::from(days.saturating_sub(1)))
}

/// GET /admin/stats/sales_by_day
pub async fn sales_by_day(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ValidatedQuery(query): ValidatedQuery<SalesQuery>,
) -> ApiResult<Json<Vec<DailySales>>> {
    let since = window_start(Utc::now(), query.days);
    let records = Purchase::completed_since(&state.db_pool, since).await?;
    debug!(days = query.days, sales = records.len(), "Computing daily sales");

    Ok(Json(bucket_sales_by_day(&records)))
}

/// GET /admin/stats/top_books
pub async fn top_books(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ValidatedQuery(query): ValidatedQuery<TopBooksQuery>,
) -> ApiResult<Json<Vec<TopBook>>> {
    Ok(Json(Purchase::top_books(&state.db_pool, query.limit).await?))
}

/// GET /admin/stats/summary
pub async fn summary(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<Json<SalesSummary>> {
    let (revenue_cents, purchases) = Purchase::completed_totals(&state.db_pool).await?;
    let users = User::count(&state.db_pool).await?;
    let books = Book::count(&state.db_pool).await?;

    Ok(Json(SalesSummary {
        revenue_cents,
        users,
        books,
        purchases,
    }))
}
