//! 메트릭 모델.
//!
//! gauge는 최신 값으로 덮어쓰고, counter는 누적한다.
//! 와이어 형식: `{"id","type":"gauge"|"counter","delta"?,"value"?,"hash"?}`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// 메트릭 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// 시점 측정값 (갱신 시 교체)
    Gauge,
    /// 누적 카운터 (갱신 시 합산)
    Counter,
}

impl MetricKind {
    /// 와이어/URL 표기
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(CoreError::InvalidMetric {
                id: String::new(),
                reason: format!("알 수 없는 메트릭 종류: {other}"),
            }),
        }
    }
}

/// 메트릭 하나
///
/// `value`/`delta` 중 정확히 하나가 `kind`에 맞게 채워져 있어야 유효하다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// 메트릭 이름 (저장 키)
    pub id: String,
    /// 메트릭 종류
    #[serde(rename = "type")]
    pub kind: MetricKind,
    /// counter 증가량
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    /// gauge 값
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// 무결성 태그
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// 한 수집 주기에서 만들어진 메트릭 묶음
pub type Batch = Vec<Metric>;

impl Metric {
    /// gauge 메트릭 생성
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Gauge,
            delta: None,
            value: Some(value),
            hash: None,
        }
    }

    /// counter 메트릭 생성
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter,
            delta: Some(delta),
            value: None,
            hash: None,
        }
    }

    /// URL 세그먼트(kind/id/value)로부터 메트릭 생성
    ///
    /// 레거시 경로 `/update/{kind}/{id}/{value}` 전용.
    pub fn from_path(kind: &str, id: &str, raw_value: &str) -> Result<Self, CoreError> {
        let kind: MetricKind = kind.parse().map_err(|_| CoreError::InvalidMetric {
            id: id.to_string(),
            reason: format!("알 수 없는 메트릭 종류: {kind}"),
        })?;

        let invalid = |reason: String| CoreError::InvalidMetric {
            id: id.to_string(),
            reason,
        };

        match kind {
            MetricKind::Gauge => raw_value
                .parse::<f64>()
                .map(|v| Metric::gauge(id, v))
                .map_err(|e| invalid(format!("gauge 값 파싱 실패 {raw_value:?}: {e}"))),
            MetricKind::Counter => raw_value
                .parse::<i64>()
                .map(|d| Metric::counter(id, d))
                .map_err(|e| invalid(format!("counter 값 파싱 실패 {raw_value:?}: {e}"))),
        }
    }

    /// 구조적 유효성 검증
    ///
    /// 값 검증을 ID 검증보다 먼저 수행한다. 값이 잘못된 메트릭은 ID와 무관하게 `InvalidMetric`.
    pub fn validate(&self) -> Result<(), CoreError> {
        let shape_ok = match self.kind {
            MetricKind::Gauge => self.value.is_some() && self.delta.is_none(),
            MetricKind::Counter => self.delta.is_some() && self.value.is_none(),
        };

        if !shape_ok {
            return Err(CoreError::InvalidMetric {
                id: self.id.clone(),
                reason: format!("{} 메트릭은 {} 필드 하나만 가져야 함", self.kind, self.value_field()),
            });
        }

        if let Some(v) = self.value {
            if !v.is_finite() {
                return Err(CoreError::InvalidMetric {
                    id: self.id.clone(),
                    reason: format!("유한하지 않은 gauge 값: {v}"),
                });
            }
        }

        if self.id.is_empty() {
            return Err(CoreError::MissingId);
        }

        Ok(())
    }

    /// 같은 ID의 새 메트릭을 병합
    ///
    /// gauge는 교체, counter는 합산. 종류가 다르면 충돌이며 자신은 변경되지 않는다.
    pub fn merge(&mut self, incoming: &Metric) -> Result<(), CoreError> {
        if self.kind != incoming.kind {
            return Err(CoreError::KindConflict {
                id: self.id.clone(),
                stored: self.kind.to_string(),
                received: incoming.kind.to_string(),
            });
        }

        match self.kind {
            MetricKind::Gauge => {
                self.value = incoming.value;
            }
            MetricKind::Counter => {
                let current = self.delta.unwrap_or(0);
                let added = incoming.delta.unwrap_or(0);
                let total = current.checked_add(added).ok_or_else(|| CoreError::InvalidMetric {
                    id: self.id.clone(),
                    reason: format!("counter 오버플로: {current} + {added}"),
                })?;
                self.delta = Some(total);
            }
        }

        self.hash = incoming.hash.clone();
        Ok(())
    }

    /// 평문 값 표현
    ///
    /// counter는 정수, gauge는 소수점 3자리에서 뒤쪽 0과 남는 `.`을 제거한다 (25.500 → 25.5).
    pub fn display_value(&self) -> String {
        match self.kind {
            MetricKind::Counter => self.delta.map(|d| d.to_string()).unwrap_or_default(),
            MetricKind::Gauge => self.value.map(format_gauge).unwrap_or_default(),
        }
    }

    fn value_field(&self) -> &'static str {
        match self.kind {
            MetricKind::Gauge => "value",
            MetricKind::Counter => "delta",
        }
    }
}

/// gauge 값을 `%.3f` 후 뒤쪽 0 제거
pub fn format_gauge(value: f64) -> String {
    let fixed = format!("{value:.3}");
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ID: {}, Type: {}, Value: {}, Delta: {}, Hash: {}}}",
            self.id,
            self.kind,
            self.value.map(format_gauge).unwrap_or_default(),
            self.delta.map(|d| d.to_string()).unwrap_or_default(),
            self.hash.as_deref().unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn wire_format_omits_absent_fields() {
        let json = serde_json::to_string(&Metric::counter("PollCount", 3)).unwrap();
        assert_eq!(json, r#"{"id":"PollCount","type":"counter","delta":3}"#);

        let json = serde_json::to_string(&Metric::gauge("Alloc", 1.5)).unwrap();
        assert_eq!(json, r#"{"id":"Alloc","type":"gauge","value":1.5}"#);
    }

    #[test]
    fn unknown_kind_fails_to_deserialize() {
        let result: Result<Metric, _> =
            serde_json::from_str(r#"{"id":"x","type":"histogram","value":1.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_missing_value() {
        let metric = Metric {
            id: "Alloc".to_string(),
            kind: MetricKind::Gauge,
            delta: None,
            value: None,
            hash: None,
        };
        assert_matches!(metric.validate(), Err(CoreError::InvalidMetric { .. }));
    }

    #[test]
    fn validate_rejects_value_of_wrong_kind() {
        let metric = Metric {
            id: "hits".to_string(),
            kind: MetricKind::Counter,
            delta: None,
            value: Some(1.0),
            hash: None,
        };
        assert_matches!(metric.validate(), Err(CoreError::InvalidMetric { .. }));
    }

    #[test]
    fn validate_rejects_empty_id() {
        assert_matches!(Metric::gauge("", 1.0).validate(), Err(CoreError::MissingId));
    }

    #[test]
    fn merge_replaces_gauge() {
        let mut stored = Metric::gauge("temp", 10.0);
        stored.merge(&Metric::gauge("temp", 25.5)).unwrap();
        stored.merge(&Metric::gauge("temp", 25.5)).unwrap();
        assert_eq!(stored.value, Some(25.5));
    }

    #[test]
    fn merge_adds_counter() {
        let mut stored = Metric::counter("hits", 3);
        stored.merge(&Metric::counter("hits", 4)).unwrap();
        assert_eq!(stored.delta, Some(7));
    }

    #[test]
    fn merge_kind_conflict_leaves_stored_untouched() {
        let mut stored = Metric::gauge("temp", 1.0);
        let before = stored.clone();
        let result = stored.merge(&Metric::counter("temp", 1));
        assert_matches!(result, Err(CoreError::KindConflict { .. }));
        assert_eq!(stored, before);
    }

    #[test]
    fn merge_counter_overflow_is_rejected() {
        let mut stored = Metric::counter("hits", i64::MAX);
        assert!(stored.merge(&Metric::counter("hits", 1)).is_err());
        assert_eq!(stored.delta, Some(i64::MAX));
    }

    #[test]
    fn from_path_parses_segments() {
        assert_eq!(
            Metric::from_path("gauge", "temp", "25.5").unwrap(),
            Metric::gauge("temp", 25.5)
        );
        assert_eq!(
            Metric::from_path("counter", "hits", "3").unwrap(),
            Metric::counter("hits", 3)
        );
        assert!(Metric::from_path("counter", "hits", "3.5").is_err());
        assert!(Metric::from_path("histogram", "x", "1").is_err());
    }

    #[test]
    fn display_value_trims_trailing_zeros() {
        assert_eq!(Metric::gauge("t", 25.5).display_value(), "25.5");
        assert_eq!(Metric::gauge("t", 25.0).display_value(), "25");
        assert_eq!(Metric::gauge("t", 0.1234).display_value(), "0.123");
        assert_eq!(Metric::counter("c", 7).display_value(), "7");
    }
}
