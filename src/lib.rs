pub mod aggregate;
pub mod bot;
pub mod cli;
pub mod cli_helpers;
pub mod config;
pub mod graph;
pub mod metrics;
pub mod rank;
pub mod service;
pub mod table;
pub mod window;

pub use aggregate::{aggregate, AccountReport, Delta};
pub use metrics::{MetricsSource, OpenTsdbClient, QueryError};
pub use rank::{rank, RankedReport};
pub use service::{RenderedReport, ReportFormat, ReportService};
pub use window::{build_window, LookbackWindow, WindowError};
