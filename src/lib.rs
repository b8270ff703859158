//! Virtual power plant dispatch.
//!
//! A battery fleet plus solar, wind, load and price forecasts go in; a
//! cost-minimal schedule of battery charge/discharge and grid buy/sell comes
//! out of a mixed-integer program with a big-M buy/sell exclusion.

pub mod api;
pub mod config;
pub mod controller;
pub mod domain;
pub mod forecast;
pub mod optimizer;
pub mod telemetry;
