//! Blocking client for uploading analysis results to a Teamscale server.
//!
//! # Overview
//! Uploads findings, metrics, coverage reports, architectures and baselines,
//! and manages global finding and metric metadata. Every operation is a
//! single synchronous HTTP round trip authenticated with HTTP Basic auth.
//! Any status other than 200 is returned as a `ServiceError`.
//!
//! # Design
//! - `ClientConfig` is immutable once the client owns it.
//! - Each operation has a `build_*` step producing a plain-data
//!   `HttpRequest`, so request shapes are testable without a server.
//! - `Transport` executes requests; `ReqwestTransport` is the blocking
//!   HTTP implementation.
//! - `UploadPayload` ties each upload kind to the one service that accepts
//!   it.
//! - Timestamps are converted from the absolute instant and truncated to
//!   whole seconds.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod payload;
pub mod timestamp;
pub mod transport;
pub mod types;

pub use client::{read_json_from_file, TeamscaleClient, MIN_API_VERSION};
pub use config::{ClientConfig, ConfigError};
pub use endpoint::{global_service_url, project_service_url, ServiceEndpoint, ServiceScope};
pub use error::{ClientError, Result, ServiceError};
pub use http::{FilePart, HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use payload::{PayloadBody, UploadPayload};
pub use timestamp::{timestamp_parameter, to_epoch_millis};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    Assessment, AssessmentColor, Baseline, CoverageFormat, Enablement, FileFindings, Finding,
    FindingDescription, FindingGroup, MetricAggregation, MetricDefinition, MetricDescription,
    MetricEntry, MetricProperty, MetricValue, MetricValueType, NonCodeMetricEntry,
};
