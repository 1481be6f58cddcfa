//! vigild: liveness verification service.
//!
//! Owns the capture pipeline, the per-session liveness controller and the
//! client for the remote identity match service. The binary exposes it on
//! D-Bus; the library surface ([`Verifier`], [`SessionHandle`]) is the
//! in-process equivalent.

pub mod client;
pub mod config;
pub mod engine;
pub mod session;

pub use client::{HttpMatchClient, MatchService, SubmitError};
pub use config::{Config, ConfigError};
pub use engine::{CameraPipeline, CaptureEvent, CaptureGuard, FramePipeline};
pub use session::{SessionError, SessionHandle, SessionRegistry, Verifier};
