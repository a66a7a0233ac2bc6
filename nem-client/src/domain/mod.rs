pub mod dispatch_price;
pub mod generator;
pub mod revenue_interval;
pub mod scada_reading;

pub use dispatch_price::DispatchPrice;
pub use generator::Generator;
pub use revenue_interval::RevenueInterval;
pub use scada_reading::ScadaReading;
