// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device capability sets.
//!
//! A capability set lists the parameters a device model supports. It bounds
//! both what a state read may contain and what an update request may set.
//! Capabilities are either advertised by the device during discovery or fall
//! back to [`Capabilities::default`].

use std::collections::BTreeSet;

use crate::types::Param;

/// Parameters supported by a device model.
///
/// # Examples
///
/// ```
/// use climate_hub::{Capabilities, types::Param};
///
/// let basic = Capabilities::default();
/// assert!(basic.supports(Param::Power));
/// assert!(!basic.supports(Param::TargetHumidity));
///
/// let custom = Capabilities::builder()
///     .with(Param::Power)
///     .with(Param::TargetTemperature)
///     .build();
/// assert_eq!(custom.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    params: BTreeSet<Param>,
}

impl Default for Capabilities {
    /// The parameter set every split unit in the fleet reports.
    fn default() -> Self {
        Self::builder()
            .with(Param::Power)
            .with(Param::Mode)
            .with(Param::TargetTemperature)
            .with(Param::CurrentTemperature)
            .with(Param::FanSpeed)
            .with(Param::HorizontalSwing)
            .with(Param::VerticalSwing)
            .with(Param::Light)
            .build()
    }
}

impl Capabilities {
    /// Creates a builder starting from an empty set.
    #[must_use]
    pub fn builder() -> CapabilitiesBuilder {
        CapabilitiesBuilder::new()
    }

    /// Creates capabilities covering every known parameter.
    #[must_use]
    pub fn full() -> Self {
        Self {
            params: Param::ALL.iter().copied().collect(),
        }
    }

    /// Builds capabilities from advertised parameter names.
    ///
    /// Unknown names are skipped. Returns `None` if no name was recognized,
    /// so callers can fall back to the default set.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let params: BTreeSet<Param> = names
            .into_iter()
            .filter_map(|name| match name.parse::<Param>() {
                Ok(param) => Some(param),
                Err(unknown) => {
                    tracing::debug!(parameter = %unknown, "Ignoring unknown advertised parameter");
                    None
                }
            })
            .collect();

        if params.is_empty() {
            None
        } else {
            Some(Self { params })
        }
    }

    /// Returns `true` if the device supports this parameter.
    #[must_use]
    pub fn supports(&self, param: Param) -> bool {
        self.params.contains(&param)
    }

    /// Returns `true` if clients may set this parameter on the device.
    #[must_use]
    pub fn accepts_write(&self, param: Param) -> bool {
        param.is_writable() && self.supports(param)
    }

    /// Iterates the supported parameters in stable order.
    pub fn iter(&self) -> impl Iterator<Item = Param> + '_ {
        self.params.iter().copied()
    }

    /// Returns the number of supported parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if no parameter is supported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Builder for creating custom capabilities.
#[derive(Debug, Default)]
pub struct CapabilitiesBuilder {
    params: BTreeSet<Param>,
}

impl CapabilitiesBuilder {
    /// Creates a new builder with no parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with(mut self, param: Param) -> Self {
        self.params.insert(param);
        self
    }

    /// Adds several parameters.
    #[must_use]
    pub fn with_all(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.params.extend(params);
        self
    }

    /// Builds the capabilities.
    #[must_use]
    pub fn build(self) -> Capabilities {
        Capabilities {
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_covers_basic_split_unit() {
        let caps = Capabilities::default();
        assert!(caps.supports(Param::Power));
        assert!(caps.supports(Param::CurrentTemperature));
        assert!(!caps.supports(Param::WaterFull));
        assert_eq!(caps.len(), 8);
    }

    #[test]
    fn full_covers_every_parameter() {
        assert_eq!(Capabilities::full().len(), Param::ALL.len());
    }

    #[test]
    fn from_names_skips_unknown() {
        let caps = Capabilities::from_names(["power", "target_humidity", "colour"]).unwrap();
        assert_eq!(
            caps.iter().collect::<Vec<_>>(),
            vec![Param::Power, Param::TargetHumidity]
        );
    }

    #[test]
    fn from_names_without_known_params_is_none() {
        assert!(Capabilities::from_names(["colour"]).is_none());
        assert!(Capabilities::from_names(std::iter::empty()).is_none());
    }

    #[test]
    fn read_only_params_do_not_accept_writes() {
        let caps = Capabilities::full();
        assert!(caps.accepts_write(Param::Power));
        assert!(!caps.accepts_write(Param::CurrentTemperature));

        let basic = Capabilities::default();
        assert!(!basic.accepts_write(Param::Turbo));
    }

    #[test]
    fn builder_deduplicates() {
        let caps = Capabilities::builder()
            .with(Param::Power)
            .with_all([Param::Power, Param::Mode])
            .build();
        assert_eq!(caps.len(), 2);
        assert!(!caps.is_empty());
    }
}
