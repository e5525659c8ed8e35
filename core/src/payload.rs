//! Upload payloads and the body each one turns into.
//!
//! Every upload kind owns exactly one target service, so a payload can only
//! ever be sent to the endpoint that understands it. JSON payloads serialize
//! to the list shapes the server expects. File payloads become multipart
//! bodies whose parts are opened by the transport at send time.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::endpoint::{self, ServiceEndpoint};
use crate::error::ClientError;
use crate::http::{FilePart, HttpMethod};
use crate::types::{
    Baseline, FileFindings, FindingDescription, FindingGroup, MetricDescription, MetricEntry,
    NonCodeMetricEntry,
};

/// Multipart field name for coverage reports; repeated once per file.
pub const COVERAGE_REPORT_FIELD: &str = "report";

/// Body of an upload. Unlike `RequestBody` it can never be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadBody {
    Json(String),
    Files(Vec<FilePart>),
}

#[derive(Debug, Clone)]
pub enum UploadPayload<'a> {
    Findings(&'a [FileFindings]),
    Metrics(&'a [MetricEntry]),
    NonCodeMetrics(&'a [NonCodeMetricEntry]),
    CoverageFiles(Vec<PathBuf>),
    /// Destination path in Teamscale mapped to the local file.
    ArchitectureFiles(BTreeMap<String, PathBuf>),
    Baseline(&'a Baseline),
    MetricDescriptions(&'a [MetricDescription]),
    FindingDescriptions(&'a [FindingDescription]),
    FindingGroup(&'a FindingGroup),
}

impl UploadPayload<'_> {
    pub fn endpoint(&self) -> ServiceEndpoint {
        match self {
            UploadPayload::Findings(_) => ServiceEndpoint::project(endpoint::ADD_EXTERNAL_FINDINGS),
            UploadPayload::Metrics(_) => ServiceEndpoint::project(endpoint::ADD_EXTERNAL_METRICS),
            UploadPayload::NonCodeMetrics(_) => {
                ServiceEndpoint::project(endpoint::ADD_NON_CODE_METRICS)
            }
            UploadPayload::CoverageFiles(_) => ServiceEndpoint::project(endpoint::EXTERNAL_REPORT),
            UploadPayload::ArchitectureFiles(_) => {
                ServiceEndpoint::project(endpoint::ARCHITECTURE_UPLOAD)
            }
            UploadPayload::Baseline(_) => ServiceEndpoint::project(endpoint::BASELINES),
            UploadPayload::MetricDescriptions(_) => {
                ServiceEndpoint::global(endpoint::ADD_METRIC_DESCRIPTION)
            }
            UploadPayload::FindingDescriptions(_) => {
                ServiceEndpoint::global(endpoint::ADD_FINDING_DESCRIPTIONS)
            }
            UploadPayload::FindingGroup(_) => ServiceEndpoint::global(endpoint::ADD_FINDINGS_GROUP),
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            UploadPayload::CoverageFiles(_) | UploadPayload::ArchitectureFiles(_) => {
                HttpMethod::Post
            }
            _ => HttpMethod::Put,
        }
    }

    pub fn body(&self) -> Result<PayloadBody, ClientError> {
        let json = match self {
            UploadPayload::Findings(findings) => serde_json::to_string(findings),
            UploadPayload::Metrics(metrics) => serde_json::to_string(metrics),
            UploadPayload::NonCodeMetrics(metrics) => serde_json::to_string(metrics),
            UploadPayload::Baseline(baseline) => serde_json::to_string(baseline),
            UploadPayload::MetricDescriptions(descriptions) => serde_json::to_string(descriptions),
            UploadPayload::FindingDescriptions(descriptions) => {
                serde_json::to_string(descriptions)
            }
            UploadPayload::FindingGroup(group) => serde_json::to_string(&[group]),
            UploadPayload::CoverageFiles(files) => {
                let parts = files
                    .iter()
                    .map(|path| FilePart {
                        field: COVERAGE_REPORT_FIELD.to_string(),
                        path: path.clone(),
                    })
                    .collect();
                return Ok(PayloadBody::Files(parts));
            }
            UploadPayload::ArchitectureFiles(files) => {
                let parts = files
                    .iter()
                    .map(|(destination, path)| FilePart {
                        field: destination.clone(),
                        path: path.clone(),
                    })
                    .collect();
                return Ok(PayloadBody::Files(parts));
            }
        };
        json.map(PayloadBody::Json)
            .map_err(ClientError::Serialization)
    }
}
