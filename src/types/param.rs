// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device parameters and their typed values.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use super::mode::{FAN_SPEEDS, HORIZONTAL_SWINGS, MODES, VERTICAL_SWINGS};
use crate::error::ValueError;

/// The kind of value a parameter carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// `true` / `false`.
    Bool,
    /// Whole number within an inclusive range.
    Int {
        /// Lowest accepted value.
        min: i64,
        /// Highest accepted value.
        max: i64,
    },
    /// Measured reading, any number.
    Number,
    /// One of a fixed set of names.
    Choice(&'static [&'static str]),
}

impl ParamKind {
    fn describe(self) -> &'static str {
        match self {
            Self::Bool => "a boolean",
            Self::Int { .. } => "an integer",
            Self::Number => "a number",
            Self::Choice(_) => "a string",
        }
    }
}

/// A named parameter of a climate device.
///
/// Parameters order by declaration, which keeps change sets and listings
/// stable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    /// Unit switched on.
    Power,
    /// Operating mode.
    Mode,
    /// Requested room temperature in °C.
    TargetTemperature,
    /// Measured room temperature in °C.
    CurrentTemperature,
    /// Requested relative humidity in %.
    TargetHumidity,
    /// Measured relative humidity in %.
    CurrentHumidity,
    /// Fan speed.
    FanSpeed,
    /// Horizontal louver position.
    HorizontalSwing,
    /// Vertical louver position.
    VerticalSwing,
    /// Turbo mode.
    Turbo,
    /// Quiet mode.
    Quiet,
    /// Display light.
    Light,
    /// Fresh air valve.
    FreshAir,
    /// Coil drying after switch-off.
    Xfan,
    /// Ionizer.
    Anion,
    /// Sleep mode.
    Sleep,
    /// Power saving mode.
    PowerSave,
    /// Audible confirmation beeps.
    Beep,
    /// Filter needs cleaning.
    CleanFilter,
    /// Condensate tank is full.
    WaterFull,
    /// Frost protection heating.
    SteadyHeat,
}

impl Param {
    /// Every parameter, in declaration order.
    pub const ALL: &'static [Param] = &[
        Self::Power,
        Self::Mode,
        Self::TargetTemperature,
        Self::CurrentTemperature,
        Self::TargetHumidity,
        Self::CurrentHumidity,
        Self::FanSpeed,
        Self::HorizontalSwing,
        Self::VerticalSwing,
        Self::Turbo,
        Self::Quiet,
        Self::Light,
        Self::FreshAir,
        Self::Xfan,
        Self::Anion,
        Self::Sleep,
        Self::PowerSave,
        Self::Beep,
        Self::CleanFilter,
        Self::WaterFull,
        Self::SteadyHeat,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Mode => "mode",
            Self::TargetTemperature => "target_temperature",
            Self::CurrentTemperature => "current_temperature",
            Self::TargetHumidity => "target_humidity",
            Self::CurrentHumidity => "current_humidity",
            Self::FanSpeed => "fan_speed",
            Self::HorizontalSwing => "horizontal_swing",
            Self::VerticalSwing => "vertical_swing",
            Self::Turbo => "turbo",
            Self::Quiet => "quiet",
            Self::Light => "light",
            Self::FreshAir => "fresh_air",
            Self::Xfan => "xfan",
            Self::Anion => "anion",
            Self::Sleep => "sleep",
            Self::PowerSave => "power_save",
            Self::Beep => "beep",
            Self::CleanFilter => "clean_filter",
            Self::WaterFull => "water_full",
            Self::SteadyHeat => "steady_heat",
        }
    }

    /// Returns the kind of value this parameter carries.
    #[must_use]
    pub const fn kind(&self) -> ParamKind {
        match self {
            Self::Mode => ParamKind::Choice(MODES),
            Self::FanSpeed => ParamKind::Choice(FAN_SPEEDS),
            Self::HorizontalSwing => ParamKind::Choice(HORIZONTAL_SWINGS),
            Self::VerticalSwing => ParamKind::Choice(VERTICAL_SWINGS),
            Self::TargetTemperature => ParamKind::Int { min: 16, max: 30 },
            Self::TargetHumidity => ParamKind::Int { min: 40, max: 90 },
            Self::CurrentTemperature | Self::CurrentHumidity => ParamKind::Number,
            _ => ParamKind::Bool,
        }
    }

    /// Returns `true` if clients may set this parameter.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        !matches!(
            self,
            Self::CurrentTemperature | Self::CurrentHumidity | Self::CleanFilter | Self::WaterFull
        )
    }

    /// Interprets a value reported by a device.
    ///
    /// Booleans may arrive as `0`/`1`. Range limits are not enforced, since
    /// a device may report a value it was configured with out of band.
    ///
    /// # Errors
    ///
    /// Returns `ValueError` if the value does not have this parameter's kind.
    pub fn read_value(&self, value: &Value) -> Result<ParamValue, ValueError> {
        let parameter = self.as_str();
        let kind = self.kind();
        let wrong_kind = || ValueError::WrongKind {
            parameter,
            expected: kind.describe(),
        };

        match kind {
            ParamKind::Bool => match value {
                Value::Bool(b) => Ok(ParamValue::Bool(*b)),
                Value::Number(n) => match n.as_u64() {
                    Some(0) => Ok(ParamValue::Bool(false)),
                    Some(1) => Ok(ParamValue::Bool(true)),
                    _ => Err(wrong_kind()),
                },
                _ => Err(wrong_kind()),
            },
            ParamKind::Int { .. } => value.as_i64().map(ParamValue::Int).ok_or_else(wrong_kind),
            ParamKind::Number => value.as_f64().map(ParamValue::Float).ok_or_else(wrong_kind),
            ParamKind::Choice(names) => {
                let text = value.as_str().ok_or_else(wrong_kind)?;
                if names.contains(&text) {
                    Ok(ParamValue::Text(text.to_string()))
                } else {
                    Err(ValueError::InvalidVariant {
                        parameter,
                        value: text.to_string(),
                    })
                }
            }
        }
    }

    /// Validates a value requested by a client.
    ///
    /// Stricter than [`read_value`](Self::read_value): booleans must be JSON
    /// booleans and integers must fall inside the parameter's range.
    ///
    /// # Errors
    ///
    /// Returns `ValueError` if the value has the wrong kind or is out of range.
    pub fn validate_request(&self, value: &Value) -> Result<ParamValue, ValueError> {
        let parameter = self.as_str();
        match self.kind() {
            ParamKind::Bool if !value.is_boolean() => Err(ValueError::WrongKind {
                parameter,
                expected: ParamKind::Bool.describe(),
            }),
            ParamKind::Int { min, max } => {
                let actual = value.as_i64().ok_or(ValueError::WrongKind {
                    parameter,
                    expected: self.kind().describe(),
                })?;
                if (min..=max).contains(&actual) {
                    Ok(ParamValue::Int(actual))
                } else {
                    Err(ValueError::OutOfRange {
                        parameter,
                        min,
                        max,
                        actual,
                    })
                }
            }
            _ => self.read_value(value),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Param {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A typed parameter value.
///
/// Comparison is exact, including for readings, since values come from
/// discrete device registers.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag.
    Bool(bool),
    /// Whole number.
    Int(i64),
    /// Reading.
    Float(f64),
    /// Named setting.
    Text(String),
}

impl ParamValue {
    /// Converts the value to JSON for a device write.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
