//! Consistency levels and distance metrics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// Read consistency requested for a query or search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    /// Read the newest data.
    Strong,
    /// Read at least this client's own writes.
    Session,
    /// Read data at most a server-chosen staleness behind.
    Bounded,
    /// No freshness requirement.
    Eventually,
    /// Use the level the collection was created with.
    #[default]
    Default,
}

impl ConsistencyLevel {
    /// Wire name of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "Strong",
            Self::Session => "Session",
            Self::Bounded => "Bounded",
            Self::Eventually => "Eventually",
            Self::Default => "Default",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distance or similarity metric of a vector search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    /// Euclidean distance.
    L2,
    /// Inner product.
    Ip,
    /// Cosine similarity.
    Cosine,
    /// Hamming distance over binary vectors.
    Hamming,
    /// Jaccard distance over binary vectors.
    Jaccard,
    /// BM25 relevance over sparse vectors.
    Bm25,
}

impl MetricType {
    /// Wire name of the metric.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::L2 => "L2",
            Self::Ip => "IP",
            Self::Cosine => "COSINE",
            Self::Hamming => "HAMMING",
            Self::Jaccard => "JACCARD",
            Self::Bm25 => "BM25",
        }
    }

    /// Returns `true` when a smaller score means a closer match.
    #[must_use]
    pub const fn smaller_is_closer(self) -> bool {
        matches!(self, Self::L2 | Self::Hamming | Self::Jaccard)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "L2" => Ok(Self::L2),
            "IP" => Ok(Self::Ip),
            "COSINE" => Ok(Self::Cosine),
            "HAMMING" => Ok(Self::Hamming),
            "JACCARD" => Ok(Self::Jaccard),
            "BM25" => Ok(Self::Bm25),
            _ => Err(WireError::invalid_value(format!("unknown metric type '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_direction() {
        assert!(MetricType::L2.smaller_is_closer());
        assert!(MetricType::Jaccard.smaller_is_closer());
        assert!(MetricType::Hamming.smaller_is_closer());
        assert!(!MetricType::Ip.smaller_is_closer());
        assert!(!MetricType::Cosine.smaller_is_closer());
        assert!(!MetricType::Bm25.smaller_is_closer());
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!("cosine".parse::<MetricType>().expect("known"), MetricType::Cosine);
        assert_eq!("IP".parse::<MetricType>().expect("known"), MetricType::Ip);
        assert!("manhattan".parse::<MetricType>().is_err());
    }

    #[test]
    fn test_default_level() {
        assert_eq!(ConsistencyLevel::default(), ConsistencyLevel::Default);
        assert_eq!(ConsistencyLevel::Session.to_string(), "Session");
    }
}
