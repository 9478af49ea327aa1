//! Collector for youth justice line items in published budget papers.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use rust_decimal::Decimal;

use yjtrack_collect::{CollectError, Collector, SourceClient};
use yjtrack_core::records::{BudgetAllocation, Dataset};
use yjtrack_core::tasks::CollectionTask;

/// Fiscal year heading, e.g. `2024-25` or `2024–25`.
static FISCAL_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(20\d{2})[\u{2013}-](\d{2})").expect("fiscal year regex is valid"));

/// `<td>Program name</td><td>$12.3 million</td>` or a plain dollar figure.
static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<td[^>]*>([^<$]+)</td>\s*<td[^>]*>\$([\d,]+(?:\.\d+)?)\s*(million)?</td>")
        .expect("budget line regex is valid")
});

pub struct BudgetPapersCollector {
    client: SourceClient,
}

impl BudgetPapersCollector {
    #[must_use]
    pub fn new(client: SourceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Collector for BudgetPapersCollector {
    async fn collect(&self, task: &CollectionTask) -> Result<Dataset, CollectError> {
        let body = self.client.get_text(&task.url).await?;
        let records = parse_budget(&body, &task.url)?;
        Ok(Dataset::BudgetAllocations(records))
    }
}

fn parse_budget(body: &str, url: &str) -> Result<Vec<BudgetAllocation>, CollectError> {
    let fiscal_year = FISCAL_YEAR_RE
        .captures(body)
        .map(|c| format!("{}-{}", &c[1], &c[2]))
        .ok_or_else(|| CollectError::Extraction {
            context: url.to_string(),
            reason: "no fiscal year heading found".to_string(),
        })?;

    let collected_at = Utc::now();
    let mut records = Vec::new();

    for captures in LINE_RE.captures_iter(body) {
        let program = captures[1].trim().to_string();
        let Some(amount) = parse_amount(&captures[2], captures.get(3).is_some()) else {
            continue;
        };

        records.push(BudgetAllocation {
            fiscal_year: fiscal_year.clone(),
            department: None,
            program: program.clone(),
            category: infer_category(&program),
            amount,
            description: None,
            source_url: url.to_string(),
            source_document: None,
            collected_at,
        });
    }

    if records.is_empty() {
        return Err(CollectError::Extraction {
            context: url.to_string(),
            reason: "no budget line items found in page".to_string(),
        });
    }

    Ok(records)
}

/// Parses `12,345.6` (optionally scaled by "million") into whole dollars
/// with cent precision.
fn parse_amount(raw: &str, millions: bool) -> Option<Decimal> {
    let cleaned = raw.replace(',', "");
    let value = cleaned.parse::<f64>().ok()?;
    let dollars = if millions { value * 1_000_000.0 } else { value };
    #[allow(clippy::cast_possible_truncation)]
    let cents = (dollars * 100.0).round() as i64;
    Some(Decimal::new(cents, 2))
}

fn infer_category(program: &str) -> Option<String> {
    let lower = program.to_lowercase();
    if lower.contains("detention") || lower.contains("custod") {
        Some("detention".to_string())
    } else if lower.contains("community") || lower.contains("diversion") {
        Some("community".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "
        <h1>Queensland Budget 2024\u{2013}25, Youth Justice</h1>
        <table>
          <tr><td>Youth Detention Operations</td><td>$312.4 million</td></tr>
          <tr><td>Community Youth Response and Diversion</td><td>$38.6 million</td></tr>
          <tr><td>Restorative Justice Conferencing</td><td>$9,450,000</td></tr>
        </table>
    ";

    #[test]
    fn parses_line_items_with_fiscal_year() {
        let records = parse_budget(PAGE, "https://budget.example.gov.au").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].fiscal_year, "2024-25");
        assert_eq!(records[0].program, "Youth Detention Operations");
        assert_eq!(records[0].amount, Decimal::new(31_240_000_000, 2));
        assert_eq!(records[0].category.as_deref(), Some("detention"));
        assert_eq!(records[1].category.as_deref(), Some("community"));
        assert_eq!(records[2].amount, Decimal::new(945_000_000, 2));
        assert_eq!(records[2].category, None);
    }

    #[test]
    fn page_without_fiscal_year_is_an_extraction_error() {
        let result = parse_budget("<td>Program</td><td>$5 million</td>", "https://x.example");
        assert!(matches!(result, Err(CollectError::Extraction { .. })));
    }

    #[test]
    fn amount_parsing_handles_commas_and_millions() {
        assert_eq!(parse_amount("1,234.5", true), Some(Decimal::new(123_450_000_000, 2)));
        assert_eq!(parse_amount("500", false), Some(Decimal::new(50_000, 2)));
        assert_eq!(parse_amount("not-a-number", false), None);
    }
}
