//! # Aethon - Solar-Aware EV Charging Automation
//!
//! A Rust daemon that keeps a household's grid exchange near zero by steering
//! an EV charging schedule from live solar telemetry: excess production goes
//! into the vehicle, grid import backs charging off, and a day/night policy
//! with a manually toggled automation mode gates the whole thing.
//!
//! ## Features
//!
//! - **Reactive control**: deadband-limited, quantized proportional
//!   controller on the latest grid reading
//! - **Robust sampling**: median of repeated live gateway readings
//! - **Day/night policy**: excess-solar charging by day, optional
//!   limit-bounded full-speed charging by night
//! - **Vendor integrations**: Rivian cloud API, Enphase IQ Gateway,
//!   Hubitat Maker API
//! - **Session reuse**: vendor login once, tokens persisted across restarts
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `controls`: Pure decision core and mode policy
//! - `sampler`: Robust grid consumption sampling
//! - `automation`: Per-cycle orchestration state machine
//! - `vehicle`: Vehicle capability and Rivian client
//! - `enphase`: Solar telemetry capability and gateway client
//! - `hubitat`: Toggle/status capability and hub client
//! - `persistence`: Vendor session persistence

pub mod automation;
pub mod config;
pub mod controls;
pub mod enphase;
pub mod error;
pub mod hubitat;
pub mod logging;
pub mod persistence;
pub mod sampler;
pub mod vehicle;

// Re-export commonly used types
pub use automation::ChargingAutomation;
pub use config::Config;
pub use error::{AethonError, Result};
