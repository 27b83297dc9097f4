use anyhow::{Context, Result};
use clap::ValueEnum;
use log::{info, warn};

use crate::aggregate::aggregate;
use crate::graph::{render_image, DEFAULT_FONT};
use crate::metrics::{Counts, MetricsSource, QueryError};
use crate::rank::{rank, RankedReport};
use crate::table::{render_table, render_text};
use crate::window::{build_window, WindowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Fixed-width monospace table
    Text,
    /// PNG table
    Image,
    /// Boxed terminal table
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedReport {
    Text(String),
    Image(Vec<u8>),
}

fn or_empty(result: Result<Counts, QueryError>, query: &str) -> Counts {
    result.unwrap_or_else(|err| {
        warn!("{query} follower query failed, continuing without it: {err}");
        Counts::new()
    })
}

/// Entry point for report generation: query, aggregate, rank, render.
pub struct ReportService<S> {
    source: S,
    font_family: String,
}

impl<S: MetricsSource> ReportService<S> {
    pub fn new(source: S) -> Self {
        ReportService {
            source,
            font_family: DEFAULT_FONT.to_string(),
        }
    }

    pub fn with_font_family(mut self, font_family: impl Into<String>) -> Self {
        self.font_family = font_family.into();
        self
    }

    /// Failed queries degrade to empty results instead of failing the report.
    pub async fn build_ranked(&self, weeks_ago: i64) -> Result<RankedReport, WindowError> {
        let window = build_window(weeks_ago)?;
        let (current, historical) = tokio::join!(
            self.source.fetch_current(),
            self.source.fetch_historical(&window)
        );
        let current = or_empty(current, "Current");
        let historical = or_empty(historical, "Historical");

        let ranked = rank(aggregate(&current, &historical), window.delta_label());
        info!(
            "Ranked {} accounts over {} ({} with history)",
            ranked.len(),
            window.label(),
            ranked
                .accounts
                .iter()
                .filter(|a| a.count_at_window_start.is_some())
                .count()
        );
        Ok(ranked)
    }

    pub async fn build_report(&self, weeks_ago: i64, format: ReportFormat) -> Result<RenderedReport> {
        let ranked = self.build_ranked(weeks_ago).await?;
        match format {
            ReportFormat::Text => Ok(RenderedReport::Text(render_text(&ranked))),
            ReportFormat::Table => Ok(RenderedReport::Text(render_table(&ranked).to_string())),
            ReportFormat::Image => {
                let font_family = self.font_family.clone();
                let png = tokio::task::spawn_blocking(move || render_image(&ranked, &font_family))
                    .await
                    .context("image render task failed")??;
                Ok(RenderedReport::Image(png))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Delta;
    use crate::metrics::fakes::{spawn_store, store_config, StaticSource};
    use crate::metrics::OpenTsdbClient;

    #[tokio::test]
    async fn ranks_known_history_first() {
        let service = ReportService::new(StaticSource::new(
            &[("alice", 150), ("bob", 42)],
            &[("alice", 140)],
        ));

        let ranked = service.build_ranked(3).await.unwrap();

        assert_eq!(ranked.delta_label, "Δ-3w");
        assert_eq!(ranked.accounts[0].username, "alice");
        assert_eq!(ranked.accounts[0].delta, Delta::Known(10));
        assert_eq!(ranked.accounts[1].username, "bob");
        assert_eq!(ranked.accounts[1].delta, Delta::Unknown);
    }

    #[tokio::test]
    async fn historical_query_uses_requested_window() {
        let service = ReportService::new(StaticSource::new(&[("alice", 1)], &[]));

        service.build_ranked(2).await.unwrap();

        let windows = service.source.windows.lock().unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_hours_ago, 336);
        assert_eq!(windows[0].end_hours_ago, 312);
    }

    #[tokio::test]
    async fn failed_historical_query_degrades_to_unknown() {
        let source = StaticSource {
            historical: None,
            ..StaticSource::new(&[("alice", 150), ("bob", 42)], &[])
        };
        let service = ReportService::new(source);

        let ranked = service.build_ranked(3).await.unwrap();

        assert_eq!(ranked.len(), 2);
        assert!(ranked.accounts.iter().all(|a| a.delta == Delta::Unknown));
    }

    #[tokio::test]
    async fn failed_current_query_yields_empty_report() {
        let source = StaticSource {
            current: None,
            ..StaticSource::new(&[], &[("alice", 140)])
        };
        let service = ReportService::new(source);

        let report = service.build_report(3, ReportFormat::Text).await.unwrap();

        match report {
            RenderedReport::Text(text) => assert_eq!(text.lines().count(), 2),
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_current_renders_both_formats() {
        let service = ReportService::new(StaticSource::new(&[], &[]));

        let text = service.build_report(3, ReportFormat::Text).await.unwrap();
        assert!(matches!(text, RenderedReport::Text(ref t) if t.lines().count() == 2));

        let image = service.build_report(3, ReportFormat::Image).await.unwrap();
        match image {
            RenderedReport::Image(png) => assert!(png.starts_with(b"\x89PNG")),
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[tokio::test]
    async fn unavailable_store_yields_empty_report() {
        let url = spawn_store(Some(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ))
        .await;
        let client = OpenTsdbClient::new(&store_config(url, 5)).unwrap();
        let service = ReportService::new(client);

        let ranked = service.build_ranked(3).await.unwrap();
        assert!(ranked.is_empty());

        let report = service.build_report(3, ReportFormat::Text).await.unwrap();
        assert!(matches!(report, RenderedReport::Text(ref t) if t.lines().count() == 2));
    }

    #[tokio::test]
    async fn invalid_window_is_rejected() {
        let service = ReportService::new(StaticSource::new(&[("alice", 1)], &[]));
        assert!(service.build_report(0, ReportFormat::Text).await.is_err());
    }
}
