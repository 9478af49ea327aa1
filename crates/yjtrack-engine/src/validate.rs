//! Declarative field validation for collected records.
//!
//! Each record is checked against per-field rules. An `Error`-severity
//! violation drops the record; `Warning`-severity violations keep it but
//! are logged. A run only fails on validation when a non-empty collection
//! loses every record.

use yjtrack_core::records::{BudgetAllocation, Dataset, ParliamentaryDocument, YouthStatistic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Violation {
    pub field: &'static str,
    pub severity: Severity,
    pub message: String,
}

impl Violation {
    fn error(field: &'static str, message: String) -> Self {
        Self {
            field,
            severity: Severity::Error,
            message,
        }
    }

    fn warning(field: &'static str, message: String) -> Self {
        Self {
            field,
            severity: Severity::Warning,
            message,
        }
    }
}

/// What survived validation, with counts for the run record.
#[derive(Debug)]
pub struct ValidationOutcome {
    pub dataset: Dataset,
    pub found: usize,
    pub dropped: usize,
    pub warnings: usize,
}

fn check_required(field: &'static str, value: &str, out: &mut Vec<Violation>) {
    if value.trim().is_empty() {
        out.push(Violation::error(field, format!("{field} must be non-empty")));
    }
}

fn check_percentage(field: &'static str, value: Option<f64>, out: &mut Vec<Violation>) {
    if let Some(v) = value {
        if !(0.0..=100.0).contains(&v) {
            out.push(Violation::error(
                field,
                format!("{field} must be within [0, 100], got {v}"),
            ));
        }
    }
}

fn check_count(field: &'static str, value: Option<i32>, out: &mut Vec<Violation>) {
    if let Some(v) = value {
        if v < 0 {
            out.push(Violation::error(
                field,
                format!("{field} must not be negative, got {v}"),
            ));
        }
    }
}

fn check_non_negative(field: &'static str, value: Option<f64>, out: &mut Vec<Violation>) {
    if let Some(v) = value {
        if v < 0.0 {
            out.push(Violation::error(
                field,
                format!("{field} must not be negative, got {v}"),
            ));
        }
    }
}

#[must_use]
pub fn validate_youth_statistic(record: &YouthStatistic) -> Vec<Violation> {
    let mut out = Vec::new();
    check_required("facility_name", &record.facility_name, &mut out);
    check_required("program_type", &record.program_type, &mut out);
    check_count("total_youth", Some(record.total_youth), &mut out);
    check_count("indigenous_youth", record.indigenous_youth, &mut out);
    check_percentage("indigenous_percentage", record.indigenous_percentage, &mut out);
    check_non_negative("average_age", record.average_age, &mut out);
    check_non_negative("average_stay_days", record.average_stay_days, &mut out);

    if let Some(indigenous) = record.indigenous_youth {
        if indigenous > record.total_youth {
            out.push(Violation::warning(
                "indigenous_youth",
                format!(
                    "indigenous_youth ({indigenous}) exceeds total_youth ({})",
                    record.total_youth
                ),
            ));
        }
    }

    out
}

#[must_use]
pub fn validate_budget_allocation(record: &BudgetAllocation) -> Vec<Violation> {
    let mut out = Vec::new();
    check_required("fiscal_year", &record.fiscal_year, &mut out);
    check_required("program", &record.program, &mut out);

    if record.amount.is_sign_negative() {
        out.push(Violation::error(
            "amount",
            format!("amount must not be negative, got {}", record.amount),
        ));
    }

    if let Some(category) = &record.category {
        if category != "detention" && category != "community" {
            out.push(Violation::warning(
                "category",
                format!("unrecognised category '{category}'"),
            ));
        }
    }

    out
}

#[must_use]
pub fn validate_parliamentary_document(record: &ParliamentaryDocument) -> Vec<Violation> {
    let mut out = Vec::new();
    check_required("title", &record.title, &mut out);
    check_required("url", &record.url, &mut out);
    check_required("document_type", &record.document_type, &mut out);
    out
}

/// Runs field rules over every record, dropping those with error-severity
/// violations and logging the rest.
#[must_use]
pub fn validate_dataset(dataset: Dataset) -> ValidationOutcome {
    match dataset {
        Dataset::YouthStatistics(records) => {
            retain_valid(records, validate_youth_statistic, Dataset::YouthStatistics)
        }
        Dataset::BudgetAllocations(records) => {
            retain_valid(records, validate_budget_allocation, Dataset::BudgetAllocations)
        }
        Dataset::ParliamentaryDocuments(records) => retain_valid(
            records,
            validate_parliamentary_document,
            Dataset::ParliamentaryDocuments,
        ),
    }
}

fn retain_valid<T>(
    records: Vec<T>,
    validate: impl Fn(&T) -> Vec<Violation>,
    wrap: impl FnOnce(Vec<T>) -> Dataset,
) -> ValidationOutcome {
    let found = records.len();
    let mut dropped = 0usize;
    let mut warnings = 0usize;
    let mut surviving = Vec::with_capacity(found);

    for record in records {
        let violations = validate(&record);
        let has_error = violations.iter().any(|v| v.severity == Severity::Error);

        for violation in &violations {
            match violation.severity {
                Severity::Error => tracing::warn!(
                    field = violation.field,
                    message = %violation.message,
                    "dropping record with validation error"
                ),
                Severity::Warning => tracing::warn!(
                    field = violation.field,
                    message = %violation.message,
                    "record kept despite validation warning"
                ),
            }
        }

        if has_error {
            dropped += 1;
        } else {
            warnings += violations.len();
            surviving.push(record);
        }
    }

    ValidationOutcome {
        dataset: wrap(surviving),
        found,
        dropped,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::*;

    fn statistic() -> YouthStatistic {
        YouthStatistic {
            date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            facility_name: "Cleveland Youth Detention Centre".to_string(),
            program_type: "detention".to_string(),
            total_youth: 96,
            indigenous_youth: Some(70),
            indigenous_percentage: Some(72.9),
            average_age: Some(15.4),
            average_stay_days: Some(60.0),
            source_url: "https://www.example.gov.au/census".to_string(),
            collected_at: Utc::now(),
        }
    }

    #[test]
    fn clean_statistic_has_no_violations() {
        assert!(validate_youth_statistic(&statistic()).is_empty());
    }

    #[test]
    fn percentage_above_100_is_an_error() {
        let mut record = statistic();
        record.indigenous_percentage = Some(140.0);
        let violations = validate_youth_statistic(&record);
        assert!(violations
            .iter()
            .any(|v| v.field == "indigenous_percentage" && v.severity == Severity::Error));
    }

    #[test]
    fn negative_percentage_is_an_error() {
        let mut record = statistic();
        record.indigenous_percentage = Some(-5.0);
        let violations = validate_youth_statistic(&record);
        assert!(violations.iter().any(|v| v.severity == Severity::Error));
    }

    #[test]
    fn negative_count_is_an_error() {
        let mut record = statistic();
        record.total_youth = -1;
        let violations = validate_youth_statistic(&record);
        assert!(violations
            .iter()
            .any(|v| v.field == "total_youth" && v.severity == Severity::Error));
    }

    #[test]
    fn indigenous_above_total_is_only_a_warning() {
        let mut record = statistic();
        record.indigenous_youth = Some(120);
        let violations = validate_youth_statistic(&record);
        assert!(violations
            .iter()
            .all(|v| v.severity == Severity::Warning));
    }

    #[test]
    fn invalid_record_is_dropped_from_dataset() {
        let mut bad = statistic();
        bad.indigenous_percentage = Some(140.0);
        let outcome =
            validate_dataset(Dataset::YouthStatistics(vec![statistic(), bad]));
        assert_eq!(outcome.found, 2);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.dataset.len(), 1);
    }

    #[test]
    fn warning_record_is_retained() {
        let mut flagged = statistic();
        flagged.indigenous_youth = Some(120);
        let outcome = validate_dataset(Dataset::YouthStatistics(vec![flagged]));
        assert_eq!(outcome.dropped, 0);
        assert_eq!(outcome.dataset.len(), 1);
        assert_eq!(outcome.warnings, 1);
    }

    #[test]
    fn negative_budget_amount_is_an_error() {
        let record = BudgetAllocation {
            fiscal_year: "2024-25".to_string(),
            department: None,
            program: "Community Youth Response".to_string(),
            category: Some("community".to_string()),
            amount: Decimal::new(-1, 0),
            description: None,
            source_url: "https://budget.example.gov.au".to_string(),
            source_document: None,
            collected_at: Utc::now(),
        };
        let violations = validate_budget_allocation(&record);
        assert!(violations
            .iter()
            .any(|v| v.field == "amount" && v.severity == Severity::Error));
    }

    #[test]
    fn untitled_document_is_an_error() {
        let record = ParliamentaryDocument {
            document_type: "hansard".to_string(),
            title: "  ".to_string(),
            date: None,
            author: None,
            url: "https://www.parliament.example.gov.au/hansard/1".to_string(),
            content: None,
            mentions_youth_justice: true,
            mentions_spending: false,
            mentions_indigenous: false,
            collected_at: Utc::now(),
        };
        let violations = validate_parliamentary_document(&record);
        assert!(violations.iter().any(|v| v.field == "title"));
    }
}
