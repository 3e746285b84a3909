//! Reason codes for rule validation failures

use serde::{Deserialize, Serialize};

/// Why a rule definition was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum RuleReason {
    // =========================================================================
    // R101-R102: Rule header
    // =========================================================================
    /// `type` missing or not static/dynamic
    R101_INVALID_TYPE,
    /// `name` missing or blank
    R102_NAME_REQUIRED,

    // =========================================================================
    // R103-R106: Steps
    // =========================================================================
    /// Step has no colors
    R103_COLORS_REQUIRED,
    /// Step color token not recognised
    R104_INVALID_COLOR,
    /// Step operator not exact/minimum/maximum
    R105_INVALID_OPERATOR,
    /// Step count not a positive integer or `$X[+|-]n`
    R106_INVALID_COUNT,

    // =========================================================================
    // R107-R108: Dynamic values
    // =========================================================================
    /// Dynamic rule without dynamic_values
    R107_DYNAMIC_VALUES_REQUIRED,
    /// dynamic_values entry not an integer in range
    R108_DYNAMIC_VALUE_OUT_OF_RANGE,

    // =========================================================================
    // R109: Shape
    // =========================================================================
    /// JSON did not have the expected shape at all
    R109_MALFORMED_DEFINITION,
}

impl RuleReason {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::R101_INVALID_TYPE => "R101_INVALID_TYPE",
            Self::R102_NAME_REQUIRED => "R102_NAME_REQUIRED",
            Self::R103_COLORS_REQUIRED => "R103_COLORS_REQUIRED",
            Self::R104_INVALID_COLOR => "R104_INVALID_COLOR",
            Self::R105_INVALID_OPERATOR => "R105_INVALID_OPERATOR",
            Self::R106_INVALID_COUNT => "R106_INVALID_COUNT",
            Self::R107_DYNAMIC_VALUES_REQUIRED => "R107_DYNAMIC_VALUES_REQUIRED",
            Self::R108_DYNAMIC_VALUE_OUT_OF_RANGE => "R108_DYNAMIC_VALUE_OUT_OF_RANGE",
            Self::R109_MALFORMED_DEFINITION => "R109_MALFORMED_DEFINITION",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::R101_INVALID_TYPE => "type must be static or dynamic",
            Self::R102_NAME_REQUIRED => "name is required",
            Self::R103_COLORS_REQUIRED => "step colors required",
            Self::R104_INVALID_COLOR => "step contains invalid colors",
            Self::R105_INVALID_OPERATOR => "step contains invalid operator",
            Self::R106_INVALID_COUNT => "step contains invalid count",
            Self::R107_DYNAMIC_VALUES_REQUIRED => "dynamic_values required for dynamic patterns",
            Self::R108_DYNAMIC_VALUE_OUT_OF_RANGE => "dynamic_values must be ints between 3 and 8",
            Self::R109_MALFORMED_DEFINITION => "rule must be a well-formed object",
        }
    }
}

impl std::fmt::Display for RuleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
