use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How log lines are rendered on stderr.
///
/// Parsing ignores ASCII case, so `--log-format COMPACT` is accepted.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event with fields flattened to the top level.
    #[default]
    Json,
    /// Single-line text for terminals.
    Compact,
}

/// Error returned when a log format name is not recognised.
pub type LogFormatParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("json", Some(LogFormat::Json))]
    #[case("Json", Some(LogFormat::Json))]
    #[case("COMPACT", Some(LogFormat::Compact))]
    #[case("pretty", None)]
    #[case("", None)]
    fn names_parse_ignoring_case(#[case] input: &str, #[case] expected: Option<LogFormat>) {
        assert_eq!(input.parse::<LogFormat>().ok(), expected);
    }

    #[test]
    fn display_matches_serde_name() {
        let rendered = LogFormat::Compact.to_string();
        let serialised = serde_json::to_value(LogFormat::Compact).expect("serialise");
        assert_eq!(serialised, serde_json::Value::String(rendered));
    }
}
