// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state tracking.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::capabilities::Capabilities;
use crate::error::TransportError;
use crate::types::{Param, ParamValue};

/// Observed state of a climate device.
///
/// A mapping of parameter to typed value. A state produced by
/// [`from_reading`](Self::from_reading) only holds parameters inside the
/// device's capability set.
///
/// # Examples
///
/// ```
/// use climate_hub::state::DeviceState;
/// use climate_hub::types::{Param, ParamValue};
///
/// let state = DeviceState::new()
///     .with(Param::Power, true)
///     .with(Param::TargetTemperature, 20);
///
/// assert_eq!(state.get(Param::Power), Some(&ParamValue::Bool(true)));
/// assert_eq!(state.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DeviceState {
    values: BTreeMap<Param, ParamValue>,
}

impl DeviceState {
    /// Creates a new empty device state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state with `param` set to `value`.
    #[must_use]
    pub fn with(mut self, param: Param, value: impl Into<ParamValue>) -> Self {
        self.set(param, value);
        self
    }

    /// Sets a parameter, returning the previous value.
    pub fn set(&mut self, param: Param, value: impl Into<ParamValue>) -> Option<ParamValue> {
        self.values.insert(param, value.into())
    }

    /// Gets the value of a parameter.
    #[must_use]
    pub fn get(&self, param: Param) -> Option<&ParamValue> {
        self.values.get(&param)
    }

    /// Iterates the known parameters in stable order.
    pub fn iter(&self) -> impl Iterator<Item = (Param, &ParamValue)> {
        self.values.iter().map(|(p, v)| (*p, v))
    }

    /// Returns the number of known parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no parameter is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Builds a state from a raw device reading.
    ///
    /// Keys outside `capabilities` are dropped, as are unknown keys. A
    /// reading that lacks a supported parameter, or carries a value of the
    /// wrong kind, is structurally invalid.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidData` for a structurally invalid reading.
    pub fn from_reading(
        raw: &Map<String, Value>,
        capabilities: &Capabilities,
    ) -> Result<Self, TransportError> {
        let mut state = Self::new();

        for param in capabilities.iter() {
            let value = raw
                .get(param.as_str())
                .filter(|v| !v.is_null())
                .ok_or_else(|| {
                    TransportError::InvalidData(format!("missing parameter {param}"))
                })?;

            let value = param
                .read_value(value)
                .map_err(|e| TransportError::InvalidData(e.to_string()))?;
            state.values.insert(param, value);
        }

        Ok(state)
    }
}

impl FromIterator<(Param, ParamValue)> for DeviceState {
    fn from_iter<I: IntoIterator<Item = (Param, ParamValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn caps() -> Capabilities {
        Capabilities::builder()
            .with(Param::Power)
            .with(Param::TargetTemperature)
            .with(Param::CurrentTemperature)
            .build()
    }

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn reading_keeps_only_supported_params() {
        let reading = raw(json!({
            "power": 1,
            "target_temperature": 21,
            "current_temperature": 23,
            "turbo": 0,
            "vendor_blob": "x"
        }));

        let state = DeviceState::from_reading(&reading, &caps()).unwrap();

        assert_eq!(state.len(), 3);
        assert_eq!(state.get(Param::Power), Some(&ParamValue::Bool(true)));
        assert_eq!(state.get(Param::Turbo), None);
        assert_eq!(
            state.get(Param::CurrentTemperature),
            Some(&ParamValue::Float(23.0))
        );
    }

    #[test]
    fn missing_param_is_invalid_data() {
        let reading = raw(json!({ "power": true, "target_temperature": 21 }));
        let err = DeviceState::from_reading(&reading, &caps()).unwrap_err();
        assert_eq!(
            err,
            TransportError::InvalidData("missing parameter current_temperature".into())
        );
    }

    #[test]
    fn null_param_counts_as_missing() {
        let reading = raw(json!({
            "power": true,
            "target_temperature": null,
            "current_temperature": 22.5
        }));
        assert!(DeviceState::from_reading(&reading, &caps()).is_err());
    }

    #[test]
    fn wrong_kind_is_invalid_data() {
        let reading = raw(json!({
            "power": "maybe",
            "target_temperature": 21,
            "current_temperature": 22.5
        }));
        assert!(matches!(
            DeviceState::from_reading(&reading, &caps()),
            Err(TransportError::InvalidData(_))
        ));
    }

    #[test]
    fn serializes_as_flat_object() {
        let state = DeviceState::new()
            .with(Param::Power, false)
            .with(Param::Mode, "cool");
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({ "power": false, "mode": "cool" })
        );
    }
}
