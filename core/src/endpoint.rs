//! Service URL construction.
//!
//! Teamscale exposes two kinds of services: project services under
//! `{base_url}/p/{project}/{service}/` and global services under
//! `{base_url}/{service}/`. The trailing slash is part of the contract.

use crate::config::ClientConfig;

pub const ADD_EXTERNAL_FINDINGS: &str = "add-external-findings";
pub const ADD_EXTERNAL_METRICS: &str = "add-external-metrics";
pub const ADD_NON_CODE_METRICS: &str = "add-none-code-metrics";
pub const EXTERNAL_REPORT: &str = "external-report";
pub const ARCHITECTURE_UPLOAD: &str = "architecture-upload";
pub const BASELINES: &str = "baselines";
pub const ADD_FINDINGS_GROUP: &str = "add-external-findings-group";
pub const ADD_FINDING_DESCRIPTIONS: &str = "add-external-finding-descriptions";
pub const ADD_METRIC_DESCRIPTION: &str = "add-external-metric-description";
pub const UPDATE_FINDINGS_SCHEMA: &str = "update-findings-schema";
pub const SERVICE_API_INFO: &str = "service-api-info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceScope {
    Project,
    Global,
}

/// A named service together with the scope it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub scope: ServiceScope,
    pub name: &'static str,
}

impl ServiceEndpoint {
    pub const fn project(name: &'static str) -> Self {
        Self {
            scope: ServiceScope::Project,
            name,
        }
    }

    pub const fn global(name: &'static str) -> Self {
        Self {
            scope: ServiceScope::Global,
            name,
        }
    }

    pub fn url(&self, config: &ClientConfig) -> String {
        match self.scope {
            ServiceScope::Project => project_service_url(config, self.name),
            ServiceScope::Global => global_service_url(config, self.name),
        }
    }
}

/// `{base_url}/p/{project}/{service_name}/`
pub fn project_service_url(config: &ClientConfig, service_name: &str) -> String {
    debug_assert!(is_service_name(service_name), "bad service name {service_name:?}");
    format!(
        "{}/p/{}/{}/",
        config.base_url(),
        config.project(),
        service_name
    )
}

/// `{base_url}/{service_name}/`
pub fn global_service_url(config: &ClientConfig, service_name: &str) -> String {
    debug_assert!(is_service_name(service_name), "bad service name {service_name:?}");
    format!("{}/{}/", config.base_url(), service_name)
}

fn is_service_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/')
}
