//! Gear symbol and gear code translation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Discrete drivetrain mode.
///
/// Serialized as the symbol the dashboard displays (`"R"`, `"N"`, `"1"`, `"2"`, `"3"`), which is
/// also the key used in the control parameter tables.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Gear {
    /// Reverse
    #[serde(rename = "R")]
    R,

    /// Neutral
    #[serde(rename = "N")]
    N,

    /// Forward 1
    #[serde(rename = "1")]
    F1,

    /// Forward 2
    #[serde(rename = "2")]
    F2,

    /// Forward 3
    #[serde(rename = "3")]
    F3,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Gear {
    /// Translate a numeric gear code recieved on the command channel.
    ///
    /// Unknown codes default to neutral.
    pub fn from_code(code: &str) -> Self {
        match code {
            "0" => Gear::R,
            "1" => Gear::N,
            "2" => Gear::F1,
            "3" => Gear::F2,
            "4" => Gear::F3,
            _ => Gear::N,
        }
    }

    /// Get the gear symbol as used in the parameter tables and telemetry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Gear::R => "R",
            Gear::N => "N",
            Gear::F1 => "1",
            Gear::F2 => "2",
            Gear::F3 => "3",
        }
    }
}

impl Default for Gear {
    fn default() -> Self {
        Gear::N
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_gear_code_translation() {
        assert_eq!(Gear::from_code("0"), Gear::R);
        assert_eq!(Gear::from_code("1"), Gear::N);
        assert_eq!(Gear::from_code("2"), Gear::F1);
        assert_eq!(Gear::from_code("3"), Gear::F2);
        assert_eq!(Gear::from_code("4"), Gear::F3);

        // Unknown codes fall back to neutral
        assert_eq!(Gear::from_code("5"), Gear::N);
        assert_eq!(Gear::from_code(""), Gear::N);
        assert_eq!(Gear::from_code("R"), Gear::N);
    }

    #[test]
    fn test_gear_serializes_as_symbol() {
        assert_eq!(serde_json::to_string(&Gear::R).unwrap(), "\"R\"");
        assert_eq!(serde_json::to_string(&Gear::F1).unwrap(), "\"1\"");
    }
}
