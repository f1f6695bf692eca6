//! Day-of-week seasonal forecasting of field-operations ticket volumes.
//!
//! Four canonical record sets (incoming, completed, cancelled and leftover
//! tickets) are filtered by an explicit [`filter::Selection`], projected over
//! the selected range from a trailing 28-day window, reconciled against what
//! actually happened, and combined into a next-day backlog estimate.

pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod output;
pub mod projection;
pub mod reconcile;
pub mod reports;
pub mod route;
pub mod types;
pub mod util;

pub use error::{ForecastError, Result};
pub use filter::{apply, Selection};
pub use projection::project;
pub use reconcile::{reconcile, reconcile_kind, KindReconciliation};
pub use route::{route_balance, RouteSummary};
pub use types::{DailyProjection, Dataset, RecordKind, RecordSet, TicketEvent};
