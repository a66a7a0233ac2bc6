pub mod window;
pub mod aggregate;
pub mod rank;
pub mod chart;
pub mod store;
pub mod views;
pub mod state;
pub mod refresh;
pub mod api;
pub mod config;
pub mod observability;
pub mod metrics_server;

pub use store::MarketData;
pub use views::DashboardSnapshot;
