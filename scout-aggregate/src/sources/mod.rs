//! Concrete HTTP source adapters.

pub mod procurement;
pub mod profile;
pub mod quotes;
pub mod web;

pub use procurement::{PpsConfig, ProcurementAdapter};
pub use profile::ProfileAdapter;
pub use quotes::{QuoteAdapter, QuoteConfig};
pub use web::{TavilyClient, TavilyConfig, WebSearchAdapter};
