//! Request façade for the Teamscale upload API.
//!
//! # Design
//! `TeamscaleClient` holds a read-only `ClientConfig` and a `Transport`.
//! Each remote operation is split into a `build_*` method that produces an
//! `HttpRequest` and, where the response carries data, a `parse_*` method
//! that consumes an `HttpResponse`. The operation methods themselves just
//! build, execute once and check the status. Any status other than 200
//! becomes a `ServiceError` and the response is not looked at further.
//!
//! Nothing is retried. Callers that need uploads to the same partition to
//! land in order must serialize those calls themselves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::ClientConfig;
use crate::endpoint::{self, global_service_url, project_service_url};
use crate::error::{ClientError, Result, ServiceError};
use crate::http::{FilePart, HttpMethod, HttpRequest, HttpResponse, RequestBody};
use crate::payload::{PayloadBody, UploadPayload};
use crate::timestamp::timestamp_parameter;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{
    Baseline, CoverageFormat, FileFindings, FindingDescription, FindingGroup, MetricDescription,
    MetricEntry, NonCodeMetricEntry,
};

/// Lowest server API version this client can talk to.
pub const MIN_API_VERSION: i64 = 2;

const JSON: &str = "application/json";

type Params = Vec<(String, String)>;

fn param(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInfo {
    api_version: i64,
}

/// Client for one Teamscale project.
#[derive(Debug, Clone)]
pub struct TeamscaleClient<T = ReqwestTransport> {
    config: ClientConfig,
    transport: T,
}

impl TeamscaleClient<ReqwestTransport> {
    /// Create a client over HTTP. Does not contact the server.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a client and verify the server speaks a compatible API version.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.check_api_version()?;
        Ok(client)
    }
}

impl<T: Transport> TeamscaleClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn project_service_url(&self, service_name: &str) -> String {
        project_service_url(&self.config, service_name)
    }

    pub fn global_service_url(&self, service_name: &str) -> String {
        global_service_url(&self.config, service_name)
    }

    // ---------------------------------------------------------------------
    // Generic requests
    // ---------------------------------------------------------------------

    pub fn build_get(&self, url: &str, parameters: Params) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            query: parameters,
            headers: vec![("accept".to_string(), JSON.to_string())],
            body: RequestBody::Empty,
        }
    }

    /// PUT with `body` serialized to JSON.
    pub fn build_put_json<B>(&self, url: &str, parameters: Params, body: &B) -> Result<HttpRequest>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_string(body).map_err(ClientError::Serialization)?;
        Ok(self.build_put_raw(url, parameters, body))
    }

    /// PUT with a body that is already JSON; it is sent unchanged.
    pub fn build_put_raw(&self, url: &str, parameters: Params, body: String) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Put,
            url: url.to_string(),
            query: parameters,
            headers: vec![("content-type".to_string(), JSON.to_string())],
            body: RequestBody::Json(body),
        }
    }

    pub fn build_post_multipart(
        &self,
        url: &str,
        parameters: Params,
        files: Vec<FilePart>,
    ) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            url: url.to_string(),
            query: parameters,
            headers: Vec::new(),
            body: RequestBody::Multipart(files),
        }
    }

    pub fn build_delete(&self, url: &str, parameters: Params) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            url: url.to_string(),
            query: parameters,
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(&self, url: &str, parameters: Params) -> Result<HttpResponse> {
        self.send(self.build_get(url, parameters))
    }

    pub fn put_json<B>(&self, url: &str, parameters: Params, body: &B) -> Result<HttpResponse>
    where
        B: Serialize + ?Sized,
    {
        self.send(self.build_put_json(url, parameters, body)?)
    }

    pub fn put_raw(&self, url: &str, parameters: Params, body: String) -> Result<HttpResponse> {
        self.send(self.build_put_raw(url, parameters, body))
    }

    pub fn post_multipart(
        &self,
        url: &str,
        parameters: Params,
        files: Vec<FilePart>,
    ) -> Result<HttpResponse> {
        self.send(self.build_post_multipart(url, parameters, files))
    }

    pub fn delete(&self, url: &str, parameters: Params) -> Result<HttpResponse> {
        self.send(self.build_delete(url, parameters))
    }

    /// Execute `request` once and require status 200.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = request.method;
        let url = request.url.clone();
        let response = self.transport.execute(request)?;
        check_status(method, &url, response)
    }

    // ---------------------------------------------------------------------
    // Uploads
    // ---------------------------------------------------------------------

    /// Request for an upload payload. Every payload knows its service and
    /// method, so the request can never target the wrong endpoint.
    pub fn build_upload(
        &self,
        payload: &UploadPayload<'_>,
        parameters: Params,
    ) -> Result<HttpRequest> {
        let url = payload.endpoint().url(&self.config);
        self.build_payload_request(&url, payload, parameters)
    }

    fn build_payload_request(
        &self,
        url: &str,
        payload: &UploadPayload<'_>,
        parameters: Params,
    ) -> Result<HttpRequest> {
        let request = match payload.body()? {
            PayloadBody::Json(body) => self.build_put_raw(url, parameters, body),
            PayloadBody::Files(files) => self.build_post_multipart(url, parameters, files),
        };
        debug_assert_eq!(request.method, payload.method());
        Ok(request)
    }

    /// Parameters shared by the JSON uploads into a partition.
    fn external_data_parameters<Tz: TimeZone>(
        &self,
        timestamp: &DateTime<Tz>,
        message: &str,
        partition: &str,
    ) -> Params {
        vec![
            param("t", timestamp_parameter(timestamp, self.config.branch())),
            param("message", message),
            param("partition", partition),
            param("skip-session", "true"),
            param("adjusttimestamp", "true"),
        ]
    }

    pub fn build_upload_findings<Tz: TimeZone>(
        &self,
        findings: &[FileFindings],
        timestamp: &DateTime<Tz>,
        message: &str,
        partition: &str,
    ) -> Result<HttpRequest> {
        let parameters = self.external_data_parameters(timestamp, message, partition);
        self.build_upload(&UploadPayload::Findings(findings), parameters)
    }

    /// Upload findings for `timestamp` into `partition`.
    #[instrument(skip_all, fields(project = %self.config.project(), partition = %partition))]
    pub fn upload_findings<Tz: TimeZone>(
        &self,
        findings: &[FileFindings],
        timestamp: &DateTime<Tz>,
        message: &str,
        partition: &str,
    ) -> Result<HttpResponse> {
        let request = self.build_upload_findings(findings, timestamp, message, partition)?;
        let response = self.send(request)?;
        info!(service = endpoint::ADD_EXTERNAL_FINDINGS, status = response.status, files = findings.len(), "uploaded findings");
        Ok(response)
    }

    pub fn build_upload_metrics<Tz: TimeZone>(
        &self,
        metrics: &[MetricEntry],
        timestamp: &DateTime<Tz>,
        message: &str,
        partition: &str,
    ) -> Result<HttpRequest> {
        let parameters = self.external_data_parameters(timestamp, message, partition);
        self.build_upload(&UploadPayload::Metrics(metrics), parameters)
    }

    #[instrument(skip_all, fields(project = %self.config.project(), partition = %partition))]
    pub fn upload_metrics<Tz: TimeZone>(
        &self,
        metrics: &[MetricEntry],
        timestamp: &DateTime<Tz>,
        message: &str,
        partition: &str,
    ) -> Result<HttpResponse> {
        let request = self.build_upload_metrics(metrics, timestamp, message, partition)?;
        let response = self.send(request)?;
        info!(service = endpoint::ADD_EXTERNAL_METRICS, status = response.status, entries = metrics.len(), "uploaded metrics");
        Ok(response)
    }

    pub fn build_upload_non_code_metrics<Tz: TimeZone>(
        &self,
        metrics: &[NonCodeMetricEntry],
        timestamp: &DateTime<Tz>,
        message: &str,
        partition: &str,
    ) -> Result<HttpRequest> {
        let parameters = self.external_data_parameters(timestamp, message, partition);
        self.build_upload(&UploadPayload::NonCodeMetrics(metrics), parameters)
    }

    #[instrument(skip_all, fields(project = %self.config.project(), partition = %partition))]
    pub fn upload_non_code_metrics<Tz: TimeZone>(
        &self,
        metrics: &[NonCodeMetricEntry],
        timestamp: &DateTime<Tz>,
        message: &str,
        partition: &str,
    ) -> Result<HttpResponse> {
        let request = self.build_upload_non_code_metrics(metrics, timestamp, message, partition)?;
        let response = self.send(request)?;
        info!(service = endpoint::ADD_NON_CODE_METRICS, status = response.status, entries = metrics.len(), "uploaded non-code metrics");
        Ok(response)
    }

    pub fn build_upload_coverage<Tz, P>(
        &self,
        coverage_files: &[P],
        format: CoverageFormat,
        timestamp: &DateTime<Tz>,
        message: &str,
        partition: &str,
    ) -> Result<HttpRequest>
    where
        Tz: TimeZone,
        P: AsRef<Path>,
    {
        let parameters = vec![
            param("t", timestamp_parameter(timestamp, self.config.branch())),
            param("message", message),
            param("partition", partition),
            param("format", format.as_str()),
            param("adjusttimestamp", "true"),
        ];
        let files = coverage_files
            .iter()
            .map(|path| path.as_ref().to_path_buf())
            .collect();
        self.build_upload(&UploadPayload::CoverageFiles(files), parameters)
    }

    /// Upload coverage reports. Every file must be readable; an unreadable
    /// file fails the call before anything is sent.
    #[instrument(skip_all, fields(project = %self.config.project(), partition = %partition, format = ?format))]
    pub fn upload_coverage<Tz, P>(
        &self,
        coverage_files: &[P],
        format: CoverageFormat,
        timestamp: &DateTime<Tz>,
        message: &str,
        partition: &str,
    ) -> Result<HttpResponse>
    where
        Tz: TimeZone,
        P: AsRef<Path>,
    {
        let request =
            self.build_upload_coverage(coverage_files, format, timestamp, message, partition)?;
        let response = self.send(request)?;
        info!(service = endpoint::EXTERNAL_REPORT, status = response.status, files = coverage_files.len(), "uploaded coverage");
        Ok(response)
    }

    pub fn build_upload_architectures<Tz: TimeZone>(
        &self,
        architectures: &BTreeMap<String, PathBuf>,
        timestamp: &DateTime<Tz>,
        message: &str,
    ) -> Result<HttpRequest> {
        let parameters = vec![
            param("t", timestamp_parameter(timestamp, self.config.branch())),
            param("message", message),
        ];
        self.build_upload(
            &UploadPayload::ArchitectureFiles(architectures.clone()),
            parameters,
        )
    }

    /// Upload architecture files, keyed by their destination path in
    /// Teamscale.
    #[instrument(skip_all, fields(project = %self.config.project()))]
    pub fn upload_architectures<Tz: TimeZone>(
        &self,
        architectures: &BTreeMap<String, PathBuf>,
        timestamp: &DateTime<Tz>,
        message: &str,
    ) -> Result<HttpResponse> {
        let request = self.build_upload_architectures(architectures, timestamp, message)?;
        let response = self.send(request)?;
        info!(service = endpoint::ARCHITECTURE_UPLOAD, status = response.status, files = architectures.len(), "uploaded architectures");
        Ok(response)
    }

    // ---------------------------------------------------------------------
    // Baselines
    // ---------------------------------------------------------------------

    fn baseline_url(&self, name: &str) -> Result<String> {
        if !is_safe_baseline_name(name) {
            return Err(ClientError::InvalidBaselineName(name.to_string()));
        }
        Ok(format!("{}{}", self.project_service_url(endpoint::BASELINES), name))
    }

    /// Request that adds `baseline`, or updates it if the name exists.
    pub fn build_add_baseline(&self, baseline: &Baseline) -> Result<HttpRequest> {
        let url = self.baseline_url(&baseline.name)?;
        self.build_payload_request(&url, &UploadPayload::Baseline(baseline), Vec::new())
    }

    #[instrument(skip_all, fields(project = %self.config.project(), baseline = %baseline.name))]
    pub fn add_baseline(&self, baseline: &Baseline) -> Result<HttpResponse> {
        let response = self.send(self.build_add_baseline(baseline)?)?;
        info!(service = endpoint::BASELINES, status = response.status, "stored baseline");
        Ok(response)
    }

    pub fn build_get_baselines(&self) -> HttpRequest {
        self.build_get(
            &self.project_service_url(endpoint::BASELINES),
            vec![param("detail", "true")],
        )
    }

    pub fn parse_baselines(&self, response: HttpResponse) -> Result<Vec<Baseline>> {
        let url = self.project_service_url(endpoint::BASELINES);
        let response = check_status(HttpMethod::Get, &url, response)?;
        serde_json::from_str(&response.body).map_err(ClientError::Deserialization)
    }

    /// All baselines of the project.
    #[instrument(skip_all, fields(project = %self.config.project(), service = endpoint::BASELINES))]
    pub fn get_baselines(&self) -> Result<Vec<Baseline>> {
        let response = self.transport.execute(self.build_get_baselines())?;
        let baselines = self.parse_baselines(response)?;
        info!(count = baselines.len(), "fetched baselines");
        Ok(baselines)
    }

    pub fn build_delete_baseline(&self, name: &str) -> Result<HttpRequest> {
        Ok(self.build_delete(&self.baseline_url(name)?, Vec::new()))
    }

    #[instrument(skip_all, fields(project = %self.config.project(), baseline = name))]
    pub fn delete_baseline(&self, name: &str) -> Result<HttpResponse> {
        let response = self.send(self.build_delete_baseline(name)?)?;
        info!(service = endpoint::BASELINES, status = response.status, "deleted baseline");
        Ok(response)
    }

    // ---------------------------------------------------------------------
    // Global configuration
    // ---------------------------------------------------------------------

    pub fn build_add_findings_group(&self, name: &str, mapping_pattern: &str) -> Result<HttpRequest> {
        let group = FindingGroup {
            group_name: name.to_string(),
            mapping: mapping_pattern.to_string(),
        };
        self.build_upload(&UploadPayload::FindingGroup(&group), Vec::new())
    }

    /// Group finding types whose id matches `mapping_pattern` under `name`.
    #[instrument(skip_all, fields(service = endpoint::ADD_FINDINGS_GROUP, group = name))]
    pub fn add_findings_group(&self, name: &str, mapping_pattern: &str) -> Result<HttpResponse> {
        let response = self.send(self.build_add_findings_group(name, mapping_pattern)?)?;
        info!(status = response.status, "added findings group");
        Ok(response)
    }

    pub fn build_add_finding_descriptions(
        &self,
        descriptions: &[FindingDescription],
    ) -> Result<HttpRequest> {
        self.build_upload(&UploadPayload::FindingDescriptions(descriptions), Vec::new())
    }

    #[instrument(skip_all, fields(service = endpoint::ADD_FINDING_DESCRIPTIONS))]
    pub fn add_finding_descriptions(
        &self,
        descriptions: &[FindingDescription],
    ) -> Result<HttpResponse> {
        let response = self.send(self.build_add_finding_descriptions(descriptions)?)?;
        info!(status = response.status, count = descriptions.len(), "added finding descriptions");
        Ok(response)
    }

    pub fn build_add_metric_descriptions(
        &self,
        descriptions: &[MetricDescription],
    ) -> Result<HttpRequest> {
        self.build_upload(&UploadPayload::MetricDescriptions(descriptions), Vec::new())
    }

    #[instrument(skip_all, fields(service = endpoint::ADD_METRIC_DESCRIPTION))]
    pub fn add_metric_descriptions(
        &self,
        descriptions: &[MetricDescription],
    ) -> Result<HttpResponse> {
        let response = self.send(self.build_add_metric_descriptions(descriptions)?)?;
        info!(status = response.status, count = descriptions.len(), "added metric descriptions");
        Ok(response)
    }

    pub fn build_update_findings_schema(&self) -> HttpRequest {
        self.build_get(
            &self.global_service_url(endpoint::UPDATE_FINDINGS_SCHEMA),
            vec![param("projects", self.config.project())],
        )
    }

    /// Make the server pick up new finding groups and descriptions in the
    /// project's analysis profile.
    #[instrument(skip_all, fields(project = %self.config.project(), service = endpoint::UPDATE_FINDINGS_SCHEMA))]
    pub fn update_findings_schema(&self) -> Result<HttpResponse> {
        let response = self.send(self.build_update_findings_schema())?;
        info!(status = response.status, "updated findings schema");
        Ok(response)
    }

    // ---------------------------------------------------------------------
    // Server info
    // ---------------------------------------------------------------------

    pub fn build_check_api_version(&self) -> HttpRequest {
        self.build_get(&self.global_service_url(endpoint::SERVICE_API_INFO), Vec::new())
    }

    pub fn parse_api_version(&self, response: HttpResponse) -> Result<i64> {
        let url = self.global_service_url(endpoint::SERVICE_API_INFO);
        let response = check_status(HttpMethod::Get, &url, response)?;
        let info: ApiInfo =
            serde_json::from_str(&response.body).map_err(ClientError::Deserialization)?;
        Ok(info.api_version)
    }

    /// Fails with `IncompatibleServer` if the server's API version is older
    /// than [`MIN_API_VERSION`].
    #[instrument(skip_all, fields(service = endpoint::SERVICE_API_INFO))]
    pub fn check_api_version(&self) -> Result<i64> {
        let response = self.transport.execute(self.build_check_api_version())?;
        let api_version = self.parse_api_version(response)?;
        if api_version < MIN_API_VERSION {
            warn!(api_version, minimum = MIN_API_VERSION, "server api too old");
            return Err(ClientError::IncompatibleServer { api_version });
        }
        info!(api_version, "server api compatible");
        Ok(api_version)
    }
}

/// Read and parse a JSON file, e.g. to validate findings prepared by another
/// tool before uploading them.
pub fn read_json_from_file(path: impl AsRef<Path>) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(ClientError::Deserialization)
}

/// Pass 200 responses through; turn everything else into a `ServiceError`.
fn check_status(method: HttpMethod, url: &str, response: HttpResponse) -> Result<HttpResponse> {
    if response.status == 200 {
        return Ok(response);
    }
    warn!(%method, url, status = response.status, "request rejected");
    Err(ServiceError {
        operation: method,
        url: url.to_string(),
        status_code: response.status,
        body: response.body,
    }
    .into())
}

/// Baseline names become the last URL path segment, so they must not be a
/// dot segment that URL normalization would resolve away.
fn is_safe_baseline_name(name: &str) -> bool {
    !matches!(name, "" | "." | "..")
        && !name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;

    use super::*;
    use crate::types::{Enablement, Finding, MetricValue};

    /// Records every request and answers with a fixed response.
    struct FakeTransport {
        requests: RefCell<Vec<HttpRequest>>,
        response: HttpResponse,
    }

    impl FakeTransport {
        fn answering(status: u16, body: &str) -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
                response: HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: body.to_string(),
                },
            }
        }

        fn only_request(&self) -> HttpRequest {
            let requests = self.requests.borrow();
            assert_eq!(requests.len(), 1, "expected exactly one request");
            requests[0].clone()
        }
    }

    impl Transport for FakeTransport {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.requests.borrow_mut().push(request);
            Ok(self.response.clone())
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("http://ts:8080", "admin", SecretString::new("pw".into()), "demo").unwrap()
    }

    fn client(transport: &FakeTransport) -> TeamscaleClient<&FakeTransport> {
        TeamscaleClient::with_transport(config(), transport)
    }

    fn new_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn upload_findings_sends_partition_parameters() {
        let transport = FakeTransport::answering(200, "success");
        let findings = vec![FileFindings::new("a.c", vec![Finding::new("EXT-1", "m")])];
        client(&transport)
            .upload_findings(&findings, &new_year(), "m", "P1")
            .unwrap();

        let request = transport.only_request();
        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(request.url, "http://ts:8080/p/demo/add-external-findings/");
        assert_eq!(
            request.query,
            vec![
                param("t", "1609459200000"),
                param("message", "m"),
                param("partition", "P1"),
                param("skip-session", "true"),
                param("adjusttimestamp", "true"),
            ]
        );
        assert_eq!(request.headers, vec![param("content-type", "application/json")]);
        let body: serde_json::Value =
            serde_json::from_str(request.body.as_json().unwrap()).unwrap();
        assert_eq!(body[0]["findings"][0]["findingTypeId"], "EXT-1");
    }

    #[test]
    fn branch_is_prefixed_to_timestamp() {
        let transport = FakeTransport::answering(200, "");
        let client = TeamscaleClient::with_transport(config().with_branch("dev"), &transport);
        let metrics = vec![MetricEntry::new("a.c").with_metric("loc", MetricValue::Numeric(1.0))];
        client
            .upload_metrics(&metrics, &new_year(), "m", "P1")
            .unwrap();

        let request = transport.only_request();
        assert_eq!(request.url, "http://ts:8080/p/demo/add-external-metrics/");
        assert_eq!(request.query_param("t"), Some("dev:1609459200000"));
    }

    #[test]
    fn non_code_metrics_target_their_service() {
        let transport = FakeTransport::answering(200, "");
        let metrics = vec![NonCodeMetricEntry::new("tests/unit")];
        client(&transport)
            .upload_non_code_metrics(&metrics, &new_year(), "m", "tests")
            .unwrap();
        assert_eq!(
            transport.only_request().url,
            "http://ts:8080/p/demo/add-none-code-metrics/"
        );
    }

    #[test]
    fn coverage_request_is_multipart_with_format() {
        let transport = FakeTransport::answering(200, "");
        let request = client(&transport)
            .build_upload_coverage(
                &["a.info", "b.info"],
                CoverageFormat::Lcov,
                &new_year(),
                "cov",
                "Coverage",
            )
            .unwrap();

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://ts:8080/p/demo/external-report/");
        assert_eq!(request.query_param("format"), Some("LCOV"));
        assert_eq!(request.query_param("adjusttimestamp"), Some("true"));
        assert_eq!(request.query_param("skip-session"), None);
        let RequestBody::Multipart(parts) = request.body else {
            panic!("expected multipart body");
        };
        assert!(parts.iter().all(|p| p.field == "report"));
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn architecture_request_only_carries_time_and_message() {
        let transport = FakeTransport::answering(200, "");
        let mut files = BTreeMap::new();
        files.insert("arch/a.architecture".to_string(), PathBuf::from("local.arch"));
        let request = client(&transport)
            .build_upload_architectures(&files, &new_year(), "arch")
            .unwrap();
        assert_eq!(request.url, "http://ts:8080/p/demo/architecture-upload/");
        assert_eq!(
            request.query,
            vec![param("t", "1609459200000"), param("message", "arch")]
        );
    }

    #[test]
    fn add_baseline_puts_to_named_url() {
        let transport = FakeTransport::answering(200, "");
        let baseline = Baseline::new("rel-2.0", "Release", 1_609_459_200_000);
        client(&transport).add_baseline(&baseline).unwrap();

        let request = transport.only_request();
        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(request.url, "http://ts:8080/p/demo/baselines/rel-2.0");
        assert!(request.query.is_empty());
        let body: Baseline = serde_json::from_str(request.body.as_json().unwrap()).unwrap();
        assert_eq!(body, baseline);
    }

    #[test]
    fn unsafe_baseline_names_are_rejected_before_sending() {
        let transport = FakeTransport::answering(200, "");
        for name in ["", ".", "..", "a/b", "a b", "x?y", "50%"] {
            let err = client(&transport)
                .add_baseline(&Baseline::new(name, "", 0))
                .unwrap_err();
            assert!(matches!(err, ClientError::InvalidBaselineName(_)), "{name:?}");
        }
        for name in [".", ".."] {
            let err = client(&transport).delete_baseline(name).unwrap_err();
            assert!(matches!(err, ClientError::InvalidBaselineName(_)), "{name:?}");
        }
        assert!(transport.requests.borrow().is_empty());
    }

    #[test]
    fn get_baselines_parses_list() {
        let transport =
            FakeTransport::answering(200, r#"[{"name":"b1","description":"d1","timestamp":1000}]"#);
        let baselines = client(&transport).get_baselines().unwrap();
        assert_eq!(baselines, vec![Baseline::new("b1", "d1", 1000)]);

        let request = transport.only_request();
        assert_eq!(request.url, "http://ts:8080/p/demo/baselines/");
        assert_eq!(request.query, vec![param("detail", "true")]);
        assert_eq!(request.headers, vec![param("accept", "application/json")]);
    }

    #[test]
    fn get_baselines_bad_json() {
        let transport = FakeTransport::answering(200, "not json");
        let err = client(&transport).get_baselines().unwrap_err();
        assert!(matches!(err, ClientError::Deserialization(_)));
    }

    #[test]
    fn delete_baseline_uses_delete() {
        let transport = FakeTransport::answering(200, "");
        client(&transport).delete_baseline("old").unwrap();
        let request = transport.only_request();
        assert_eq!(request.method, HttpMethod::Delete);
        assert_eq!(request.url, "http://ts:8080/p/demo/baselines/old");
    }

    #[test]
    fn findings_group_goes_to_global_service() {
        let transport = FakeTransport::answering(200, "");
        client(&transport)
            .add_findings_group("Lint", "lint-.*")
            .unwrap();
        let request = transport.only_request();
        assert_eq!(request.url, "http://ts:8080/add-external-findings-group/");
        assert_eq!(
            request.body.as_json(),
            Some(r#"[{"groupName":"Lint","mapping":"lint-.*"}]"#)
        );
    }

    #[test]
    fn descriptions_go_to_global_services() {
        let transport = FakeTransport::answering(200, "");
        let client = client(&transport);
        client
            .add_finding_descriptions(&[FindingDescription::new("EXT-1", "d", Enablement::Off)])
            .unwrap();
        client
            .add_metric_descriptions(&[MetricDescription::new("m", "M", "d", "g")])
            .unwrap();

        let requests = transport.requests.borrow();
        assert_eq!(requests[0].url, "http://ts:8080/add-external-finding-descriptions/");
        assert_eq!(requests[1].url, "http://ts:8080/add-external-metric-description/");
        assert!(requests.iter().all(|r| r.method == HttpMethod::Put));
    }

    #[test]
    fn update_findings_schema_names_project() {
        let transport = FakeTransport::answering(200, "");
        client(&transport).update_findings_schema().unwrap();
        let request = transport.only_request();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "http://ts:8080/update-findings-schema/");
        assert_eq!(request.query, vec![param("projects", "demo")]);
    }

    #[test]
    fn non_200_statuses_become_service_errors() {
        for status in [201, 204, 400, 401, 404, 500, 503] {
            let transport = FakeTransport::answering(status, "nope");
            let err = client(&transport)
                .upload_findings(&[], &new_year(), "m", "P1")
                .unwrap_err();
            let service = err.as_service_error().expect("service error");
            assert_eq!(service.status_code, status);
            assert_eq!(service.body, "nope");
            assert_eq!(service.operation, HttpMethod::Put);
            assert_eq!(service.url, "http://ts:8080/p/demo/add-external-findings/");
        }
    }

    #[test]
    fn get_baselines_error_is_not_parsed() {
        let transport = FakeTransport::answering(500, "[]");
        let err = client(&transport).get_baselines().unwrap_err();
        assert_eq!(err.as_service_error().map(|e| e.status_code), Some(500));
    }

    #[test]
    fn api_version_check() {
        let transport = FakeTransport::answering(200, r#"{"apiVersion":5}"#);
        assert_eq!(client(&transport).check_api_version().unwrap(), 5);
        assert_eq!(
            transport.only_request().url,
            "http://ts:8080/service-api-info/"
        );

        let transport = FakeTransport::answering(200, r#"{"apiVersion":1}"#);
        let err = client(&transport).check_api_version().unwrap_err();
        assert!(matches!(err, ClientError::IncompatibleServer { api_version: 1 }));
    }

    #[test]
    fn generic_put_json_serializes_structured_body() {
        let transport = FakeTransport::answering(200, "");
        let client = client(&transport);
        let url = client.global_service_url("custom-service");
        client
            .put_json(&url, vec![param("flag", "false")], &serde_json::json!({"a": 1}))
            .unwrap();

        let request = transport.only_request();
        assert_eq!(request.url, "http://ts:8080/custom-service/");
        assert_eq!(request.query_param("flag"), Some("false"));
        assert_eq!(request.body.as_json(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn baseline_name_safety() {
        assert!(is_safe_baseline_name("rel-2.0"));
        assert!(is_safe_baseline_name("v1_final"));
        assert!(!is_safe_baseline_name("a\\b"));
        assert!(!is_safe_baseline_name("a#b"));
        assert!(!is_safe_baseline_name("tab\there"));
    }

    #[test]
    fn read_json_from_file_parses_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("findings.json");
        std::fs::write(&path, r#"[{"path":"a.c","findings":[]}]"#).unwrap();
        let value = read_json_from_file(&path).unwrap();
        assert_eq!(value[0]["path"], "a.c");

        std::fs::write(&path, "{broken").unwrap();
        assert!(matches!(
            read_json_from_file(&path).unwrap_err(),
            ClientError::Deserialization(_)
        ));
    }
}
