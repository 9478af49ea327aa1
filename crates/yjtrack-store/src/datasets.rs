//! Primary-store upserts and reads for the collected-statistics tables.
//!
//! Each upsert replaces by the table's natural key. Insert-vs-update counts
//! come from `RETURNING (xmax = 0)`, which is true only for rows created by
//! this statement.

use chrono::{DateTime, Utc};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use yjtrack_core::records::{BudgetAllocation, Dataset, ParliamentaryDocument, YouthStatistic};

use crate::StoreError;

/// How many records an upsert created vs replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: i32,
    pub updated: i32,
}

impl UpsertCounts {
    fn record(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.updated += 1;
        }
    }
}

/// Upserts a whole dataset into its table.
///
/// # Errors
///
/// Returns [`StoreError::Sqlx`] if any write fails; earlier writes in the
/// batch are not rolled back (each record is an independent idempotent
/// upsert, so a retried run converges).
pub async fn upsert_dataset(pool: &PgPool, dataset: &Dataset) -> Result<UpsertCounts, StoreError> {
    let mut counts = UpsertCounts::default();

    match dataset {
        Dataset::YouthStatistics(records) => {
            for record in records {
                counts.record(upsert_youth_statistic(pool, record).await?);
            }
        }
        Dataset::BudgetAllocations(records) => {
            for record in records {
                counts.record(upsert_budget_allocation(pool, record).await?);
            }
        }
        Dataset::ParliamentaryDocuments(records) => {
            for record in records {
                counts.record(upsert_parliamentary_document(pool, record).await?);
            }
        }
    }

    Ok(counts)
}

async fn upsert_youth_statistic(pool: &PgPool, record: &YouthStatistic) -> Result<bool, StoreError> {
    let inserted: bool = sqlx::query_scalar(
        "INSERT INTO youth_statistics \
             (date, facility_name, program_type, total_youth, indigenous_youth, \
              indigenous_percentage, average_age, average_stay_days, source_url, collected_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (date, facility_name, program_type) DO UPDATE SET \
             total_youth           = EXCLUDED.total_youth, \
             indigenous_youth      = EXCLUDED.indigenous_youth, \
             indigenous_percentage = EXCLUDED.indigenous_percentage, \
             average_age           = EXCLUDED.average_age, \
             average_stay_days     = EXCLUDED.average_stay_days, \
             source_url            = EXCLUDED.source_url, \
             collected_at          = EXCLUDED.collected_at \
         RETURNING (xmax = 0)",
    )
    .bind(record.date)
    .bind(&record.facility_name)
    .bind(&record.program_type)
    .bind(record.total_youth)
    .bind(record.indigenous_youth)
    .bind(record.indigenous_percentage)
    .bind(record.average_age)
    .bind(record.average_stay_days)
    .bind(&record.source_url)
    .bind(record.collected_at)
    .fetch_one(pool)
    .await?;

    Ok(inserted)
}

async fn upsert_budget_allocation(
    pool: &PgPool,
    record: &BudgetAllocation,
) -> Result<bool, StoreError> {
    let inserted: bool = sqlx::query_scalar(
        "INSERT INTO budget_allocations \
             (fiscal_year, department, program, category, amount, description, \
              source_url, source_document, collected_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (fiscal_year, program) DO UPDATE SET \
             department      = EXCLUDED.department, \
             category        = EXCLUDED.category, \
             amount          = EXCLUDED.amount, \
             description     = EXCLUDED.description, \
             source_url      = EXCLUDED.source_url, \
             source_document = EXCLUDED.source_document, \
             collected_at    = EXCLUDED.collected_at \
         RETURNING (xmax = 0)",
    )
    .bind(&record.fiscal_year)
    .bind(&record.department)
    .bind(&record.program)
    .bind(&record.category)
    .bind(record.amount)
    .bind(&record.description)
    .bind(&record.source_url)
    .bind(&record.source_document)
    .bind(record.collected_at)
    .fetch_one(pool)
    .await?;

    Ok(inserted)
}

async fn upsert_parliamentary_document(
    pool: &PgPool,
    record: &ParliamentaryDocument,
) -> Result<bool, StoreError> {
    let inserted: bool = sqlx::query_scalar(
        "INSERT INTO parliamentary_documents \
             (document_type, title, date, author, url, content, \
              mentions_youth_justice, mentions_spending, mentions_indigenous, collected_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (url) DO UPDATE SET \
             document_type          = EXCLUDED.document_type, \
             title                  = EXCLUDED.title, \
             date                   = EXCLUDED.date, \
             author                 = EXCLUDED.author, \
             content                = EXCLUDED.content, \
             mentions_youth_justice = EXCLUDED.mentions_youth_justice, \
             mentions_spending      = EXCLUDED.mentions_spending, \
             mentions_indigenous    = EXCLUDED.mentions_indigenous, \
             collected_at           = EXCLUDED.collected_at \
         RETURNING (xmax = 0)",
    )
    .bind(&record.document_type)
    .bind(&record.title)
    .bind(record.date)
    .bind(&record.author)
    .bind(&record.url)
    .bind(&record.content)
    .bind(record.mentions_youth_justice)
    .bind(record.mentions_spending)
    .bind(record.mentions_indigenous)
    .bind(record.collected_at)
    .fetch_one(pool)
    .await?;

    Ok(inserted)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct YouthStatisticRow {
    date: NaiveDate,
    facility_name: String,
    program_type: String,
    total_youth: i32,
    indigenous_youth: Option<i32>,
    indigenous_percentage: Option<f64>,
    average_age: Option<f64>,
    average_stay_days: Option<f64>,
    source_url: String,
    collected_at: DateTime<Utc>,
}

impl From<YouthStatisticRow> for YouthStatistic {
    fn from(row: YouthStatisticRow) -> Self {
        Self {
            date: row.date,
            facility_name: row.facility_name,
            program_type: row.program_type,
            total_youth: row.total_youth,
            indigenous_youth: row.indigenous_youth,
            indigenous_percentage: row.indigenous_percentage,
            average_age: row.average_age,
            average_stay_days: row.average_stay_days,
            source_url: row.source_url,
            collected_at: row.collected_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BudgetAllocationRow {
    fiscal_year: String,
    department: Option<String>,
    program: String,
    category: Option<String>,
    amount: Decimal,
    description: Option<String>,
    source_url: String,
    source_document: Option<String>,
    collected_at: DateTime<Utc>,
}

impl From<BudgetAllocationRow> for BudgetAllocation {
    fn from(row: BudgetAllocationRow) -> Self {
        Self {
            fiscal_year: row.fiscal_year,
            department: row.department,
            program: row.program,
            category: row.category,
            amount: row.amount,
            description: row.description,
            source_url: row.source_url,
            source_document: row.source_document,
            collected_at: row.collected_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ParliamentaryDocumentRow {
    document_type: String,
    title: String,
    date: Option<NaiveDate>,
    author: Option<String>,
    url: String,
    content: Option<String>,
    mentions_youth_justice: bool,
    mentions_spending: bool,
    mentions_indigenous: bool,
    collected_at: DateTime<Utc>,
}

impl From<ParliamentaryDocumentRow> for ParliamentaryDocument {
    fn from(row: ParliamentaryDocumentRow) -> Self {
        Self {
            document_type: row.document_type,
            title: row.title,
            date: row.date,
            author: row.author,
            url: row.url,
            content: row.content,
            mentions_youth_justice: row.mentions_youth_justice,
            mentions_spending: row.mentions_spending,
            mentions_indigenous: row.mentions_indigenous,
            collected_at: row.collected_at,
        }
    }
}

/// Returns the most recent youth statistics, newest date first.
///
/// # Errors
///
/// Returns [`StoreError::Sqlx`] if the query fails.
pub async fn list_youth_statistics(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<YouthStatistic>, StoreError> {
    let rows = sqlx::query_as::<_, YouthStatisticRow>(
        "SELECT date, facility_name, program_type, total_youth, indigenous_youth, \
                indigenous_percentage, average_age, average_stay_days, source_url, collected_at \
         FROM youth_statistics \
         ORDER BY date DESC, facility_name \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Returns budget allocations, newest fiscal year first.
///
/// # Errors
///
/// Returns [`StoreError::Sqlx`] if the query fails.
pub async fn list_budget_allocations(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<BudgetAllocation>, StoreError> {
    let rows = sqlx::query_as::<_, BudgetAllocationRow>(
        "SELECT fiscal_year, department, program, category, amount, description, \
                source_url, source_document, collected_at \
         FROM budget_allocations \
         ORDER BY fiscal_year DESC, program \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Returns parliamentary documents, newest first.
///
/// # Errors
///
/// Returns [`StoreError::Sqlx`] if the query fails.
pub async fn list_parliamentary_documents(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<ParliamentaryDocument>, StoreError> {
    let rows = sqlx::query_as::<_, ParliamentaryDocumentRow>(
        "SELECT document_type, title, date, author, url, content, \
                mentions_youth_justice, mentions_spending, mentions_indigenous, collected_at \
         FROM parliamentary_documents \
         ORDER BY date DESC NULLS LAST, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}
