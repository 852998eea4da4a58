use super::{Algorithm, NodeConfig, NodeKind};
use crate::measure::Ratio;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Error returned when a configuration value is rejected.
///
/// Values are always checked before anything is mutated: a rejected
/// patch leaves the node untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("{field} does not apply to {kind} nodes")]
    NotApplicable { field: &'static str, kind: NodeKind },
    #[error("unknown config field `{0}`")]
    UnknownField(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// The untyped value of a `{nodeId, field, value}` update as it comes off
/// the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// A change to a single mutable configuration field.
///
/// Construct it with [`ConfigPatch::parse`] (which validates the range of
/// the value) and apply it with [`Node::apply`], which checks that the
/// field exists on that kind of node.
///
/// ```
/// use flowsim_core::node::{ConfigPatch, FieldValue};
///
/// let patch = ConfigPatch::parse("maxRPS", FieldValue::Number(250.0)).unwrap();
/// assert_eq!(patch, ConfigPatch::MaxRps(250.0));
///
/// assert!(ConfigPatch::parse("maxRPS", FieldValue::Number(-1.0)).is_err());
/// assert!(ConfigPatch::parse("colour", FieldValue::Number(1.0)).is_err());
/// ```
///
/// [`Node::apply`]: super::Node::apply
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigPatch {
    Rps(f64),
    MaxRps(f64),
    BaseLatency(f64),
    ConcurrencyLimit(f64),
    Algorithm(Algorithm),
    ReadRatio(Ratio),
    BackpressureEnabled(bool),
    BackpressureThreshold(Ratio),
    IsReplica(bool),
}

impl ConfigPatch {
    /// Parse and range-check a `{field, value}` pair.
    pub fn parse(field: &str, value: FieldValue) -> Result<Self, ConfigError> {
        let patch = match field {
            "rps" => Self::Rps(rate("rps", number("rps", value)?)?),
            "maxRPS" | "maxRps" => Self::MaxRps(capacity("maxRPS", number("maxRPS", value)?)?),
            "baseLatency" => Self::BaseLatency(capacity(
                "baseLatency",
                number("baseLatency", value)?,
            )?),
            "concurrencyLimit" => Self::ConcurrencyLimit(rate(
                "concurrencyLimit",
                number("concurrencyLimit", value)?,
            )?),
            "readRatio" => Self::ReadRatio(ratio("readRatio", number("readRatio", value)?)?),
            "backpressureThreshold" => Self::BackpressureThreshold(threshold(
                "backpressureThreshold",
                number("backpressureThreshold", value)?,
            )?),
            "backpressureEnabled" => {
                Self::BackpressureEnabled(boolean("backpressureEnabled", value)?)
            }
            "isReplica" => Self::IsReplica(boolean("isReplica", value)?),
            "algorithm" => match value {
                FieldValue::Text(text) => Self::Algorithm(text.parse()?),
                other => return Err(wrong_type("algorithm", "a string", &other)),
            },
            unknown => return Err(ConfigError::UnknownField(unknown.to_owned())),
        };
        Ok(patch)
    }

    /// The wire name of the field this patch changes.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Rps(_) => "rps",
            Self::MaxRps(_) => "maxRPS",
            Self::BaseLatency(_) => "baseLatency",
            Self::ConcurrencyLimit(_) => "concurrencyLimit",
            Self::Algorithm(_) => "algorithm",
            Self::ReadRatio(_) => "readRatio",
            Self::BackpressureEnabled(_) => "backpressureEnabled",
            Self::BackpressureThreshold(_) => "backpressureThreshold",
            Self::IsReplica(_) => "isReplica",
        }
    }

    pub(crate) fn apply_to(&self, config: &mut NodeConfig) -> Result<(), ConfigError> {
        match (*self, config) {
            (Self::Rps(rps), NodeConfig::Client(client)) => client.rps = rps,
            (Self::ReadRatio(ratio), NodeConfig::Client(client)) => client.read_ratio = ratio,
            (Self::ReadRatio(ratio), NodeConfig::DbRouter(router)) => router.read_ratio = ratio,

            (Self::MaxRps(max), NodeConfig::LoadBalancer(lb)) => lb.max_rps = max,
            (Self::Algorithm(algorithm), NodeConfig::LoadBalancer(lb)) => lb.algorithm = algorithm,
            (Self::BackpressureEnabled(on), NodeConfig::LoadBalancer(lb)) => {
                lb.backpressure_enabled = on
            }
            (Self::BackpressureThreshold(t), NodeConfig::LoadBalancer(lb)) => {
                lb.backpressure_threshold = t
            }

            (Self::MaxRps(max), NodeConfig::AppServer(server)) => server.max_rps = max,
            (Self::BaseLatency(ms), NodeConfig::AppServer(server)) => server.base_latency = ms,
            (Self::ConcurrencyLimit(n), NodeConfig::AppServer(server)) => {
                server.concurrency_limit = n
            }

            (Self::MaxRps(max), NodeConfig::Database(db)) => db.server.max_rps = max,
            (Self::BaseLatency(ms), NodeConfig::Database(db)) => db.server.base_latency = ms,
            (Self::ConcurrencyLimit(n), NodeConfig::Database(db)) => {
                db.server.concurrency_limit = n
            }
            (Self::IsReplica(replica), NodeConfig::Database(db)) => db.is_replica = replica,

            (patch, config) => {
                return Err(ConfigError::NotApplicable {
                    field: patch.field(),
                    kind: config.kind(),
                });
            }
        }
        Ok(())
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" | "round-robin" | "roundrobin" => Ok(Self::RoundRobin),
            "capacity_weighted" | "capacity-weighted" | "weighted" => Ok(Self::CapacityWeighted),
            other => Err(ConfigError::InvalidValue {
                field: "algorithm",
                reason: format!("unknown algorithm `{other}`"),
            }),
        }
    }
}

fn wrong_type(field: &'static str, expected: &str, got: &FieldValue) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: format!("expected {expected}, got {got:?}"),
    }
}

fn number(field: &'static str, value: FieldValue) -> Result<f64, ConfigError> {
    match value {
        FieldValue::Number(n) => Ok(n),
        other => Err(wrong_type(field, "a number", &other)),
    }
}

fn boolean(field: &'static str, value: FieldValue) -> Result<bool, ConfigError> {
    match value {
        FieldValue::Bool(b) => Ok(b),
        other => Err(wrong_type(field, "a boolean", &other)),
    }
}

/// Finite and `>= 0`.
pub(crate) fn rate(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "a finite number >= 0",
        })
    }
}

/// Finite and `> 0`.
pub(crate) fn capacity(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "a finite number > 0",
        })
    }
}

pub(crate) fn ratio(field: &'static str, value: f64) -> Result<Ratio, ConfigError> {
    Ratio::new(value).map_err(|_| ConfigError::OutOfRange {
        field,
        value,
        expected: "in [0, 1]",
    })
}

/// In `(0, 1]`.
pub(crate) fn threshold(field: &'static str, value: f64) -> Result<Ratio, ConfigError> {
    match Ratio::new(value) {
        Ok(ratio) if !ratio.is_zero() => Ok(ratio),
        _ => Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "in (0, 1]",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ClientConfig, DatabaseConfig, LoadBalancerConfig, ServerConfig};

    fn database() -> NodeConfig {
        NodeConfig::Database(DatabaseConfig {
            server: ServerConfig {
                max_rps: 50.0,
                base_latency: 50.0,
                concurrency_limit: 0.0,
            },
            is_replica: false,
        })
    }

    #[test]
    fn parse_every_field() {
        use FieldValue::*;
        assert_eq!(
            ConfigPatch::parse("rps", Number(10.0)).unwrap(),
            ConfigPatch::Rps(10.0)
        );
        assert_eq!(
            ConfigPatch::parse("baseLatency", Number(5.0)).unwrap(),
            ConfigPatch::BaseLatency(5.0)
        );
        assert_eq!(
            ConfigPatch::parse("concurrencyLimit", Number(0.0)).unwrap(),
            ConfigPatch::ConcurrencyLimit(0.0)
        );
        assert_eq!(
            ConfigPatch::parse("algorithm", Text("capacity_weighted".into())).unwrap(),
            ConfigPatch::Algorithm(Algorithm::CapacityWeighted)
        );
        assert_eq!(
            ConfigPatch::parse("readRatio", Number(0.5)).unwrap(),
            ConfigPatch::ReadRatio(Ratio::new(0.5).unwrap())
        );
        assert_eq!(
            ConfigPatch::parse("backpressureEnabled", Bool(true)).unwrap(),
            ConfigPatch::BackpressureEnabled(true)
        );
        assert_eq!(
            ConfigPatch::parse("isReplica", Bool(true)).unwrap(),
            ConfigPatch::IsReplica(true)
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        use FieldValue::*;
        assert!(matches!(
            ConfigPatch::parse("maxRPS", Number(0.0)),
            Err(ConfigError::OutOfRange { field: "maxRPS", .. })
        ));
        assert!(ConfigPatch::parse("rps", Number(-5.0)).is_err());
        assert!(ConfigPatch::parse("rps", Number(f64::INFINITY)).is_err());
        assert!(ConfigPatch::parse("readRatio", Number(1.2)).is_err());
        assert!(ConfigPatch::parse("backpressureThreshold", Number(0.0)).is_err());
        assert!(ConfigPatch::parse("backpressureThreshold", Number(1.0)).is_ok());
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        assert!(matches!(
            ConfigPatch::parse("isReplica", FieldValue::Number(1.0)),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(ConfigPatch::parse("algorithm", FieldValue::Text("random".into())).is_err());
    }

    #[test]
    fn unknown_field() {
        assert_eq!(
            ConfigPatch::parse("colour", FieldValue::Bool(true)),
            Err(ConfigError::UnknownField("colour".into()))
        );
    }

    #[test]
    fn apply_to_matching_kind() {
        let mut config = database();
        ConfigPatch::IsReplica(true).apply_to(&mut config).unwrap();
        ConfigPatch::MaxRps(75.0).apply_to(&mut config).unwrap();
        assert!(config.is_replica());
        assert_eq!(config.max_rps(), Some(75.0));
    }

    #[test]
    fn apply_to_other_kind_is_rejected() {
        let mut config = NodeConfig::Client(ClientConfig {
            rps: 10.0,
            read_ratio: Ratio::ONE,
        });
        let before = config;
        assert_eq!(
            ConfigPatch::MaxRps(10.0).apply_to(&mut config),
            Err(ConfigError::NotApplicable {
                field: "maxRPS",
                kind: NodeKind::Client
            })
        );
        assert_eq!(config, before);

        let mut lb = NodeConfig::LoadBalancer(LoadBalancerConfig {
            max_rps: 500.0,
            algorithm: Algorithm::RoundRobin,
            backpressure_enabled: false,
            backpressure_threshold: Ratio::new(0.9).unwrap(),
        });
        assert!(ConfigPatch::IsReplica(true).apply_to(&mut lb).is_err());
    }

    #[test]
    fn field_value_deserializes_untagged() {
        let values: Vec<FieldValue> = serde_json::from_str(r#"[true, 12, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                FieldValue::Bool(true),
                FieldValue::Number(12.0),
                FieldValue::Text("x".into())
            ]
        );
    }
}
