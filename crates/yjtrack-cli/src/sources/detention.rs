//! Collector for the youth detention census page.
//!
//! The census page publishes one table row per facility with total and
//! First Nations young-people counts. Rows that do not look like facility
//! rows are ignored; a page with no recognisable rows at all is an
//! extraction failure (the page layout changed, or we fetched the wrong
//! document).

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use regex::Regex;

use yjtrack_collect::{CollectError, Collector, SourceClient};
use yjtrack_core::records::{Dataset, YouthStatistic};
use yjtrack_core::tasks::CollectionTask;

/// `<tr><td>Facility</td><td>total</td><td>indigenous</td></tr>`, whitespace-tolerant.
static ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<tr[^>]*>\s*<td[^>]*>([^<]+)</td>\s*<td[^>]*>(\d+)</td>\s*<td[^>]*>(\d+)</td>",
    )
    .expect("census row regex is valid")
});

/// An ISO census date somewhere on the page, e.g. `data-date="2025-07-01"`.
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2})").expect("census date regex is valid"));

pub struct DetentionCensusCollector {
    client: SourceClient,
}

impl DetentionCensusCollector {
    #[must_use]
    pub fn new(client: SourceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Collector for DetentionCensusCollector {
    async fn collect(&self, task: &CollectionTask) -> Result<Dataset, CollectError> {
        let body = self.client.get_text(&task.url).await?;
        let records = parse_census(&body, &task.url)?;
        Ok(Dataset::YouthStatistics(records))
    }
}

fn parse_census(body: &str, url: &str) -> Result<Vec<YouthStatistic>, CollectError> {
    let collected_at = Utc::now();
    let date = DATE_RE
        .captures(body)
        .and_then(|c| NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok())
        .unwrap_or_else(|| collected_at.date_naive());

    let mut records = Vec::new();
    for captures in ROW_RE.captures_iter(body) {
        let facility_name = captures[1].trim().to_string();
        // Header rows match the facility cell but not the numeric cells;
        // anything that got here has two numeric cells.
        let Ok(total_youth) = captures[2].parse::<i32>() else {
            continue;
        };
        let Ok(indigenous_youth) = captures[3].parse::<i32>() else {
            continue;
        };

        let indigenous_percentage = if total_youth > 0 {
            Some(round1(f64::from(indigenous_youth) / f64::from(total_youth) * 100.0))
        } else {
            None
        };

        records.push(YouthStatistic {
            date,
            facility_name,
            program_type: "detention".to_string(),
            total_youth,
            indigenous_youth: Some(indigenous_youth),
            indigenous_percentage,
            average_age: None,
            average_stay_days: None,
            source_url: url.to_string(),
            collected_at,
        });
    }

    if records.is_empty() {
        return Err(CollectError::Extraction {
            context: url.to_string(),
            reason: "no census rows found in page".to_string(),
        });
    }

    Ok(records)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
