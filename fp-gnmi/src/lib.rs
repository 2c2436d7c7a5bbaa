//! gNMI (gRPC Network Management Interface) client for featureprofiles
//!
//! Reads and writes OpenConfig state on a device under test and streams
//! its telemetry. Every call goes through the latency interceptors from
//! `fp-latency`, so a target configured with `latency: "250ms"` sees each
//! unary call and each streamed message delayed accordingly.

pub mod client;
pub mod config;
pub mod error;
pub mod path;
pub mod subscriber;
pub mod telemetry;

// Include the generated protobuf code
pub mod gnmi {
    tonic::include_proto!("gnmi");
}

pub use client::{GnmiClient, SetOperation};
pub use config::{GnmiConfig, GnmiTarget};
pub use error::{GnmiError, Result};
pub use subscriber::GnmiSubscriber;
pub use telemetry::{TelemetryPoint, TelemetryValue};
