//! Simulated ECG source, threshold classifier, WebSocket streaming and
//! severity-gated alerting.
//!
//! The server (`ecg-server`) runs one [`simulation::SimulationController`] per
//! connection and pushes a [`reading::Reading`] every second over `/ecg`. The
//! client (`ecg-client`) classifies each reading with [`reading::classify`] and
//! hands the result to a [`notify::CompositeNotifier`].

pub mod config;
pub mod display;
pub mod error;
pub mod generator;
pub mod ingest;
pub mod logging;
pub mod notify;
pub mod reading;
pub mod session;
pub mod simulation;
