//! Raw records of an xctool-style `json-stream` reporter.
//!
//! Each line of a timings file is one JSON object. Only a handful of fields
//! matter for sharding; everything else the reporter emits (`result`,
//! `exceptions`, `output`, ...) is ignored on deserialization.
//!
//! ## Record kinds
//!
//! - `begin-ocunit`: a test target starts. Carries `targetName`.
//! - `end-test`: a single test method finished. Carries `className` and
//!   `totalDuration` (seconds, as a number or a numeric string).
//!
//! Every field is optional so that malformed records fail shape checks at
//! the boundary instead of deep inside aggregation.

use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnError, DisplayFromStr, PickFirst, serde_as};

/// `event` value announcing the start of a test target.
pub const BEGIN_TARGET_EVENT: &str = "begin-ocunit";

/// `event` value reporting a finished test method.
pub const END_TEST_EVENT: &str = "end-test";

/// One line of a `json-stream` timings file.
///
/// `totalDuration` accepts both `1.5` and `"1.5"`. Values that are neither
/// a number nor a numeric string deserialize as `None`.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    /// Reporter event kind (`begin-ocunit`, `end-test`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Test marker. Any value other than `null` or `false` is truthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<serde_json::Value>,
    /// Target announced by a `begin-ocunit` record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    /// Class of the finished test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Wall time of the finished test, in seconds.
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<f64>,
}

impl StreamRecord {
    /// Builds a `begin-ocunit` record for `target`.
    pub fn target_begin(target: impl Into<String>) -> Self {
        Self {
            event: Some(BEGIN_TARGET_EVENT.to_owned()),
            target_name: Some(target.into()),
            ..Self::default()
        }
    }

    /// Builds an `end-test` record the way xctool reports a passing test.
    pub fn test_end(
        class_name: impl Into<String>,
        method_name: &str,
        duration_seconds: f64,
    ) -> Self {
        let class_name = class_name.into();
        Self {
            event: Some(END_TEST_EVENT.to_owned()),
            test: Some(serde_json::Value::String(format!(
                "-[{class_name} {method_name}]"
            ))),
            class_name: Some(class_name),
            total_duration: Some(duration_seconds),
            ..Self::default()
        }
    }

    /// Returns true for `begin-ocunit` records.
    pub fn is_target_begin(&self) -> bool {
        self.event.as_deref() == Some(BEGIN_TARGET_EVENT)
    }

    /// Returns true for `end-test` records carrying a truthy test marker.
    pub fn is_test_end(&self) -> bool {
        self.event.as_deref() == Some(END_TEST_EVENT) && self.has_test_marker()
    }

    /// Returns the test duration in seconds, or zero when absent.
    pub fn duration_seconds(&self) -> f64 {
        self.total_duration.unwrap_or(0.0)
    }

    fn has_test_marker(&self) -> bool {
        !matches!(
            self.test,
            None | Some(serde_json::Value::Null | serde_json::Value::Bool(false))
        )
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::testutil::arb_name;

    #[test]
    fn parses_xctool_end_test_line() {
        let line = r#"{"result":"success","exceptions":[],"test":"-[Foo testBar]","className":"Foo","event":"end-test","methodName":"testBar","succeeded":true,"output":"","totalDuration":0.25,"timestamp":0}"#;
        let record: StreamRecord = serde_json::from_str(line).unwrap();

        assert!(record.is_test_end());
        assert!(!record.is_target_begin());
        assert_eq!(record.class_name.as_deref(), Some("Foo"));
        assert!((record.duration_seconds() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_textual_duration() {
        let line = r#"{"event":"end-test","test":"1","className":"Foo","totalDuration":"1.5"}"#;
        let record: StreamRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.total_duration, Some(1.5));
    }

    #[test]
    fn garbage_duration_counts_as_zero() {
        let line = r#"{"event":"end-test","test":"1","className":"Foo","totalDuration":"fast"}"#;
        let record: StreamRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.total_duration, None);
        assert!(record.duration_seconds().abs() < f64::EPSILON);
    }

    #[test]
    fn falsy_test_marker_is_not_a_test_end() {
        for marker in ["null", "false"] {
            let line = format!(
                r#"{{"event":"end-test","test":{marker},"className":"Foo"}}"#
            );
            let record: StreamRecord = serde_json::from_str(&line).unwrap();
            assert!(!record.is_test_end(), "marker {marker} must be falsy");
        }

        let missing: StreamRecord =
            serde_json::from_str(r#"{"event":"end-test","className":"Foo"}"#)
                .unwrap();
        assert!(!missing.is_test_end());
    }

    #[test]
    fn begin_ocunit_line() {
        let line = r#"{"result":"success","event":"begin-ocunit","targetName":"AppTests"}"#;
        let record: StreamRecord = serde_json::from_str(line).unwrap();
        assert!(record.is_target_begin());
        assert_eq!(record.target_name.as_deref(), Some("AppTests"));
    }

    #[test]
    fn builders_match_reporter_shape() {
        let record = StreamRecord::test_end("Foo", "testBar", 2.0);
        assert_eq!(
            record.test,
            Some(serde_json::Value::String("-[Foo testBar]".into()))
        );
        assert!(record.is_test_end());
        assert!(StreamRecord::target_begin("T").is_target_begin());
    }

    proptest! {
        /// Records written by the builders survive a JSON roundtrip.
        #[test]
        fn test_record_roundtrip(
            class in arb_name(),
            method in arb_name(),
            millis in 0u32..10_000_000,
        ) {
            let record = StreamRecord::test_end(
                class,
                &method,
                f64::from(millis) / 1000.0,
            );
            let json = serde_json::to_string(&record).expect("serialize");
            let parsed: StreamRecord =
                serde_json::from_str(&json).expect("deserialize");
            prop_assert_eq!(&parsed.event, &record.event);
            prop_assert_eq!(&parsed.test, &record.test);
            prop_assert_eq!(&parsed.class_name, &record.class_name);
            let drift =
                (parsed.duration_seconds() - record.duration_seconds()).abs();
            prop_assert!(drift < 1e-9);
        }
    }
}
