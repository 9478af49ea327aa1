//! Domain record types produced by collectors.
//!
//! Every record carries its own provenance (`source_url`, `collected_at`)
//! and a natural key used for deduplicating upserts. A [`Dataset`] is one
//! homogeneous batch as returned by a single collection run.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Daily census snapshot for one facility and program type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YouthStatistic {
    pub date: NaiveDate,
    pub facility_name: String,
    /// `"detention"` or `"community"`.
    pub program_type: String,
    pub total_youth: i32,
    pub indigenous_youth: Option<i32>,
    pub indigenous_percentage: Option<f64>,
    pub average_age: Option<f64>,
    pub average_stay_days: Option<f64>,
    pub source_url: String,
    pub collected_at: DateTime<Utc>,
}

impl YouthStatistic {
    #[must_use]
    pub fn natural_key(&self) -> String {
        format!("{}|{}|{}", self.date, self.facility_name, self.program_type)
    }
}

/// One line item from a published budget paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    /// E.g. `"2024-25"`.
    pub fiscal_year: String,
    pub department: Option<String>,
    pub program: String,
    /// `"detention"` or `"community"`.
    pub category: Option<String>,
    pub amount: Decimal,
    pub description: Option<String>,
    pub source_url: String,
    pub source_document: Option<String>,
    pub collected_at: DateTime<Utc>,
}

impl BudgetAllocation {
    #[must_use]
    pub fn natural_key(&self) -> String {
        format!("{}|{}", self.fiscal_year, self.program)
    }
}

/// A Hansard record, committee report, or question on notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParliamentaryDocument {
    /// `"hansard"`, `"committee_report"`, or `"question_on_notice"`.
    pub document_type: String,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub author: Option<String>,
    pub url: String,
    pub content: Option<String>,
    pub mentions_youth_justice: bool,
    pub mentions_spending: bool,
    pub mentions_indigenous: bool,
    pub collected_at: DateTime<Utc>,
}

impl ParliamentaryDocument {
    #[must_use]
    pub fn natural_key(&self) -> String {
        self.url.clone()
    }
}

/// A homogeneous batch of records from one collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Dataset {
    YouthStatistics(Vec<YouthStatistic>),
    BudgetAllocations(Vec<BudgetAllocation>),
    ParliamentaryDocuments(Vec<ParliamentaryDocument>),
}

impl Dataset {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Dataset::YouthStatistics(v) => v.len(),
            Dataset::BudgetAllocations(v) => v.len(),
            Dataset::ParliamentaryDocuments(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The logical table this batch is persisted to.
    #[must_use]
    pub fn table(&self) -> &'static str {
        match self {
            Dataset::YouthStatistics(_) => "youth_statistics",
            Dataset::BudgetAllocations(_) => "budget_allocations",
            Dataset::ParliamentaryDocuments(_) => "parliamentary_documents",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statistic() -> YouthStatistic {
        YouthStatistic {
            date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            facility_name: "Cleveland Youth Detention Centre".to_string(),
            program_type: "detention".to_string(),
            total_youth: 96,
            indigenous_youth: Some(71),
            indigenous_percentage: Some(74.0),
            average_age: Some(15.6),
            average_stay_days: Some(62.0),
            source_url: "https://www.example.gov.au/census".to_string(),
            collected_at: Utc::now(),
        }
    }

    #[test]
    fn youth_statistic_natural_key_includes_program_type() {
        let stat = statistic();
        assert_eq!(
            stat.natural_key(),
            "2025-07-01|Cleveland Youth Detention Centre|detention"
        );
    }

    #[test]
    fn budget_allocation_natural_key() {
        let alloc = BudgetAllocation {
            fiscal_year: "2024-25".to_string(),
            department: Some("Department of Youth Justice".to_string()),
            program: "Community Youth Response".to_string(),
            category: Some("community".to_string()),
            amount: Decimal::new(12_500_000, 0),
            description: None,
            source_url: "https://budget.example.gov.au/papers".to_string(),
            source_document: Some("Budget Paper 4".to_string()),
            collected_at: Utc::now(),
        };
        assert_eq!(alloc.natural_key(), "2024-25|Community Youth Response");
    }

    #[test]
    fn dataset_len_and_table() {
        let dataset = Dataset::YouthStatistics(vec![statistic()]);
        assert_eq!(dataset.len(), 1);
        assert!(!dataset.is_empty());
        assert_eq!(dataset.table(), "youth_statistics");
    }

    #[test]
    fn dataset_round_trips_through_json() {
        let dataset = Dataset::YouthStatistics(vec![statistic()]);
        let json = serde_json::to_string(&dataset).unwrap();
        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.table(), "youth_statistics");
    }
}
