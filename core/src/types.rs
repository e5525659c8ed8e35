//! Domain DTOs for the Teamscale upload API.
//!
//! # Design
//! Field names follow the server's camelCase JSON schema through serde
//! attributes. Enumerations serialize as the upper-case constants the server
//! expects. Optional location fields are omitted when unset rather than sent
//! as `null`.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::timestamp::{from_epoch_millis, to_epoch_millis};

/// Rating attached to a single finding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Assessment {
    Red,
    #[default]
    Yellow,
}

/// Colors used in assessment distributions of non-code metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssessmentColor {
    Red,
    Yellow,
    Green,
}

/// Default rating for a finding type when it is added to an analysis profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Enablement {
    /// Always rated red.
    Red,
    /// Always rated yellow.
    Yellow,
    /// Use the assessment of the concrete finding.
    Auto,
    /// Disabled by default.
    Off,
}

/// How a metric is aggregated up the directory hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricAggregation {
    #[default]
    Sum,
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricValueType {
    #[default]
    Numeric,
    Timestamp,
    Assessment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricProperty {
    /// Plain counting metric.
    SizeMetric,
    /// Percentage between 0 and 1.
    RatioMetric,
    /// Cannot be assessed, e.g. number of files.
    QualityNeutral,
    /// Inverts the default "high is bad" rating.
    LowIsBad,
}

/// Coverage report formats the server can interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageFormat {
    Ctc,
    Cobertura,
    Gcov,
    Lcov,
    XrBaboon,
    Jacoco,
}

impl CoverageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            CoverageFormat::Ctc => "CTC",
            CoverageFormat::Cobertura => "COBERTURA",
            CoverageFormat::Gcov => "GCOV",
            CoverageFormat::Lcov => "LCOV",
            CoverageFormat::XrBaboon => "XR_BABOON",
            CoverageFormat::Jacoco => "JACOCO",
        }
    }
}

/// A single detected issue within a file.
///
/// Either offsets (zero-based, inclusive) or lines (one-based, inclusive)
/// locate the finding. An `identifier` replaces both for non-textual elements
/// such as model parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub finding_type_id: String,
    pub message: String,
    #[serde(default)]
    pub assessment: Assessment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl Finding {
    /// A yellow finding without a location.
    pub fn new(finding_type_id: &str, message: &str) -> Self {
        Self {
            finding_type_id: finding_type_id.to_string(),
            message: message.to_string(),
            assessment: Assessment::default(),
            start_offset: None,
            end_offset: None,
            start_line: None,
            end_line: None,
            identifier: None,
        }
    }

    pub fn with_assessment(mut self, assessment: Assessment) -> Self {
        self.assessment = assessment;
        self
    }

    pub fn at_lines(mut self, start_line: u64, end_line: u64) -> Self {
        self.start_line = Some(start_line);
        self.end_line = Some(end_line);
        self
    }

    pub fn at_offsets(mut self, start_offset: u64, end_offset: u64) -> Self {
        self.start_offset = Some(start_offset);
        self.end_offset = Some(end_offset);
        self
    }

    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.identifier = Some(identifier.to_string());
        self
    }
}

/// All findings of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFindings {
    pub findings: Vec<Finding>,
    /// Path of the file in Teamscale.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FileFindings {
    pub fn new(path: &str, findings: Vec<Finding>) -> Self {
        Self {
            findings,
            path: path.to_string(),
            content: None,
        }
    }
}

/// Value of a single metric. The variant must match the metric's
/// `MetricValueType`.
///
/// On the wire a timestamp is just a number, so deserializing never yields
/// `Timestamp`: every JSON number reads back as `Numeric`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Numeric(f64),
    /// Milliseconds since the epoch.
    Timestamp(i64),
    /// Counts of green, yellow and red.
    Assessment([u64; 3]),
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Number(f64),
            Counts([u64; 3]),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Number(value) => MetricValue::Numeric(value),
            Wire::Counts(counts) => MetricValue::Assessment(counts),
        })
    }
}

/// Metric values for a path, keyed by metric id.
///
/// The path may also address an architecture component using
/// `-architectures-/<architecture-name>/path/to/component/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub path: String,
    pub metrics: BTreeMap<String, MetricValue>,
}

impl MetricEntry {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, metric_id: &str, value: MetricValue) -> Self {
        self.metrics.insert(metric_id.to_string(), value);
        self
    }
}

/// Metric data attached to an arbitrary (non-source) path, such as a test
/// run or a build step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonCodeMetricEntry {
    pub path: String,
    #[serde(default)]
    pub content: String,
    pub count: u64,
    #[serde(default)]
    pub assessment: BTreeMap<AssessmentColor, u64>,
    /// Time spent producing the result, e.g. test duration.
    #[serde(default)]
    pub time: f64,
}

impl NonCodeMetricEntry {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            content: String::new(),
            count: 1,
            assessment: BTreeMap::new(),
            time: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub name: String,
    pub aggregation: MetricAggregation,
    pub description: String,
    pub properties: Vec<MetricProperty>,
    pub value_type: MetricValueType,
}

/// Definition of an external metric, registered once at configuration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDescription {
    pub metric_id: String,
    pub analysis_group: String,
    pub metric_definition: MetricDefinition,
}

impl MetricDescription {
    /// A summed numeric size metric.
    pub fn new(metric_id: &str, display_name: &str, description: &str, group_id: &str) -> Self {
        Self {
            metric_id: metric_id.to_string(),
            analysis_group: group_id.to_string(),
            metric_definition: MetricDefinition {
                name: display_name.to_string(),
                aggregation: MetricAggregation::default(),
                description: description.to_string(),
                properties: vec![MetricProperty::SizeMetric],
                value_type: MetricValueType::default(),
            },
        }
    }

    pub fn with_aggregation(mut self, aggregation: MetricAggregation) -> Self {
        self.metric_definition.aggregation = aggregation;
        self
    }

    pub fn with_value_type(mut self, value_type: MetricValueType) -> Self {
        self.metric_definition.value_type = value_type;
        self
    }

    pub fn with_properties(mut self, properties: Vec<MetricProperty>) -> Self {
        self.metric_definition.properties = properties;
        self
    }
}

/// Description of an external finding type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingDescription {
    #[serde(rename = "typeId")]
    pub typeid: String,
    pub description: String,
    pub enablement: Enablement,
}

impl FindingDescription {
    pub fn new(typeid: &str, description: &str, enablement: Enablement) -> Self {
        Self {
            typeid: typeid.to_string(),
            description: description.to_string(),
            enablement,
        }
    }
}

/// Groups finding types whose id matches `mapping` under `group_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingGroup {
    pub group_name: String,
    /// Regular expression matched against finding type ids.
    pub mapping: String,
}

/// A named reference point the server computes deltas against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Baseline {
    pub name: String,
    pub description: String,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
}

impl Baseline {
    pub fn new(name: &str, description: &str, timestamp: i64) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            timestamp,
        }
    }

    /// Baseline at `date`, truncated to the whole second.
    pub fn at<Tz: TimeZone>(name: &str, description: &str, date: &DateTime<Tz>) -> Self {
        Self::new(name, description, to_epoch_millis(date))
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        from_epoch_millis(self.timestamp)
    }
}
