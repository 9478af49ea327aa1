//! Collector for Questions on Notice index pages.
//!
//! Scans the tabled-questions index for links whose titles touch youth
//! justice, and records each as a parliamentary document with keyword
//! flags. Question bodies are not fetched here; the link title carries
//! enough signal for the flags and the URL is the natural key.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;

use yjtrack_collect::{CollectError, Collector, SourceClient};
use yjtrack_core::records::{Dataset, ParliamentaryDocument};
use yjtrack_core::tasks::CollectionTask;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s+[^>]*href="([^"]+)"[^>]*>([^<]+)</a>"#).expect("link regex is valid")
});

const YOUTH_JUSTICE_TERMS: &[&str] = &["youth justice", "youth detention", "young offender"];
const SPENDING_TERMS: &[&str] = &["spending", "cost", "budget", "expenditure", "funding", "$"];
const INDIGENOUS_TERMS: &[&str] = &["indigenous", "aboriginal", "torres strait", "first nations"];

pub struct QuestionsOnNoticeCollector {
    client: SourceClient,
}

impl QuestionsOnNoticeCollector {
    #[must_use]
    pub fn new(client: SourceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Collector for QuestionsOnNoticeCollector {
    async fn collect(&self, task: &CollectionTask) -> Result<Dataset, CollectError> {
        let body = self.client.get_text(&task.url).await?;
        let records = parse_questions(&body, &task.url);
        Ok(Dataset::ParliamentaryDocuments(records))
    }
}

fn mentions_any(haystack: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| haystack.contains(term))
}

/// An index with no matching questions is a normal empty result, not an
/// extraction failure — most sitting days table nothing about youth justice.
fn parse_questions(body: &str, base_url: &str) -> Vec<ParliamentaryDocument> {
    let collected_at = Utc::now();
    let mut records = Vec::new();

    for captures in LINK_RE.captures_iter(body) {
        let href = captures[1].trim();
        let title = captures[2].trim().to_string();
        let lower = title.to_lowercase();

        if !mentions_any(&lower, YOUTH_JUSTICE_TERMS) {
            continue;
        }

        records.push(ParliamentaryDocument {
            document_type: "question_on_notice".to_string(),
            title,
            date: None,
            author: None,
            url: absolute_url(base_url, href),
            content: None,
            mentions_youth_justice: true,
            mentions_spending: mentions_any(&lower, SPENDING_TERMS),
            mentions_indigenous: mentions_any(&lower, INDIGENOUS_TERMS),
            collected_at,
        });
    }

    records
}

fn absolute_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        href.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <ul>
          <li><a href="/qon/2025/1234">Question on youth justice spending in North Queensland</a></li>
          <li><a href="https://www.parliament.example.gov.au/qon/2025/1235">Youth detention of Aboriginal children</a></li>
          <li><a href="/qon/2025/1236">Agricultural levies review</a></li>
        </ul>
    "#;

    #[test]
    fn keeps_only_youth_justice_questions() {
        let records = parse_questions(PAGE, "https://www.parliament.example.gov.au");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.mentions_youth_justice));
    }

    #[test]
    fn flags_spending_and_indigenous_mentions() {
        let records = parse_questions(PAGE, "https://www.parliament.example.gov.au");
        assert!(records[0].mentions_spending);
        assert!(!records[0].mentions_indigenous);
        assert!(records[1].mentions_indigenous);
        assert!(!records[1].mentions_spending);
    }

    #[test]
    fn resolves_relative_urls_against_the_index() {
        let records = parse_questions(PAGE, "https://www.parliament.example.gov.au");
        assert_eq!(
            records[0].url,
            "https://www.parliament.example.gov.au/qon/2025/1234"
        );
        assert_eq!(
            records[1].url,
            "https://www.parliament.example.gov.au/qon/2025/1235"
        );
    }

    #[test]
    fn unrelated_index_yields_empty_not_error() {
        let records = parse_questions("<a href=\"/x\">Roads update</a>", "https://x.example");
        assert!(records.is_empty());
    }
}
