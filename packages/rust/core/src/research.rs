//! Research aggregation: sequential search, merging and context formatting.

use tracing::{info, instrument, warn};

use leadmagnet_shared::{ResearchAggregate, ResearchItem, SearchResult, redact_secrets};

use crate::ports::SearchProvider;

/// Context text used when no search result is available.
pub const NO_RESEARCH_SENTINEL: &str = "No research data available.";

/// Characters of raw page content kept per source.
pub const RAW_CONTENT_PREVIEW_CHARS: usize = 500;

/// Run every query once, strictly in order, recording each outcome.
///
/// A provider error or a response without a `results` field is a failed
/// item; failures never stop the loop.
#[instrument(skip_all, fields(queries = queries.len(), max_results = max_results))]
pub async fn run_sequential_search(
    queries: &[String],
    provider: &dyn SearchProvider,
    max_results: u32,
) -> ResearchAggregate {
    let mut aggregate = ResearchAggregate::new();

    for (idx, query) in queries.iter().enumerate() {
        let item = match provider.search(query, max_results).await {
            Ok(response) => match response.results {
                Some(results) => {
                    info!(query = idx + 1, hits = results.len(), "search succeeded");
                    ResearchItem::succeeded(query.as_str(), results)
                }
                None => {
                    warn!(query = idx + 1, "search response has no results field");
                    ResearchItem::failed(query.as_str(), "response contained no results field")
                }
            },
            Err(e) => {
                let msg = redact_secrets(&e.to_string());
                warn!(query = idx + 1, error = %msg, "search failed");
                ResearchItem::failed(query.as_str(), msg)
            }
        };
        aggregate.push(item);
    }

    info!(
        succeeded = aggregate.success_count(),
        failed = aggregate.fail_count(),
        "search loop finished"
    );
    aggregate
}

/// Flatten the results of successful items, keeping item order and the
/// order within each item.
pub fn merge_research_items(aggregate: &ResearchAggregate) -> Vec<SearchResult> {
    aggregate
        .items()
        .iter()
        .filter(|item| item.success)
        .flat_map(|item| item.results.iter().cloned())
        .collect()
}

/// `true` when no query succeeded, which makes the whole search stage fail.
pub fn check_search_failure(aggregate: &ResearchAggregate) -> bool {
    aggregate.success_count() == 0
}

/// Render results as numbered source blocks separated by blank lines.
pub fn format_research_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESEARCH_SENTINEL.to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(idx, result)| format_source_block(idx + 1, result))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_source_block(number: usize, result: &SearchResult) -> String {
    let title = result.title.as_deref().unwrap_or("Untitled");
    let mut block = format!(
        "Source {number}:\nTitle: {title}\nURL: {}\nContent: {}",
        result.url, result.content
    );

    if let Some(raw) = result.raw_content.as_deref().filter(|r| !r.is_empty()) {
        let preview: String = raw.chars().take(RAW_CONTENT_PREVIEW_CHARS).collect();
        block.push_str(&format!("\nFull Content: {preview}..."));
    }

    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubSearch;

    fn queries(list: &[&str]) -> Vec<String> {
        list.iter().map(|q| q.to_string()).collect()
    }

    #[tokio::test]
    async fn every_query_attempted_once_in_order() {
        let search = StubSearch::new()
            .fail_on("q2", "connection reset")
            .missing_results_on("q3");
        let aggregate =
            run_sequential_search(&queries(&["q1", "q2", "q3", "q4"]), &search, 3).await;

        assert_eq!(search.seen(), vec!["q1", "q2", "q3", "q4"]);
        assert_eq!(aggregate.success_count(), 2);
        assert_eq!(aggregate.fail_count(), 2);
        assert_eq!(aggregate.items().len(), 4);
        assert!(!check_search_failure(&aggregate));

        let failed = &aggregate.items()[1];
        assert!(!failed.success);
        assert!(failed.error.contains("connection reset"));
    }

    #[tokio::test]
    async fn empty_results_list_counts_as_success() {
        let search = StubSearch::new().with_hits(0);
        let aggregate = run_sequential_search(&queries(&["only"]), &search, 5).await;
        assert_eq!(aggregate.success_count(), 1);
        assert!(merge_research_items(&aggregate).is_empty());
    }

    #[tokio::test]
    async fn all_failures_trigger_search_failure() {
        let search = StubSearch::new()
            .fail_on("a", "HTTP 401 api_key=sk-live")
            .fail_on("b", "timeout");
        let aggregate = run_sequential_search(&queries(&["a", "b"]), &search, 5).await;

        assert!(check_search_failure(&aggregate));
        assert_eq!(
            aggregate.success_count() + aggregate.fail_count(),
            aggregate.items().len()
        );
        let first = &aggregate.items()[0];
        assert!(first.error.ends_with("[REDACTED]"));
        assert!(!first.error.contains("sk-live"));
    }

    #[test]
    fn merge_skips_failed_items_and_keeps_order() {
        let aggregate: ResearchAggregate = vec![
            ResearchItem::succeeded("q1", vec![SearchResult::new("1", "u1", "c1")]),
            ResearchItem::failed("q2", "boom"),
            ResearchItem::succeeded(
                "q3",
                vec![
                    SearchResult::new("3", "u3", "c3"),
                    SearchResult::new("4", "u4", "c4"),
                ],
            ),
        ]
        .into_iter()
        .collect();

        let titles: Vec<_> = merge_research_items(&aggregate)
            .into_iter()
            .filter_map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["1", "3", "4"]);
    }

    #[test]
    fn empty_context_is_sentinel() {
        assert_eq!(format_research_context(&[]), "No research data available.");
    }

    #[test]
    fn context_blocks_are_numbered_and_separated() {
        let untitled = SearchResult {
            url: "https://b".into(),
            content: "second".into(),
            ..Default::default()
        };
        let context = format_research_context(&[
            SearchResult::new("First", "https://a", "first"),
            untitled,
        ]);

        assert_eq!(
            context,
            "Source 1:\nTitle: First\nURL: https://a\nContent: first\n\n\
             Source 2:\nTitle: Untitled\nURL: https://b\nContent: second"
        );
    }

    #[test]
    fn raw_content_is_truncated_with_ellipsis() {
        let long = "é".repeat(600);
        let result = SearchResult::new("T", "u", "c").with_raw_content(long);
        let context = format_research_context(&[result]);

        let full = context
            .lines()
            .find(|l| l.starts_with("Full Content: "))
            .unwrap();
        let body = full.trim_start_matches("Full Content: ");
        assert!(body.ends_with("..."));
        assert_eq!(body.trim_end_matches("...").chars().count(), 500);
    }

    #[test]
    fn empty_raw_content_is_omitted() {
        let result = SearchResult::new("T", "u", "c").with_raw_content("");
        assert!(!format_research_context(&[result]).contains("Full Content"));
    }
}
