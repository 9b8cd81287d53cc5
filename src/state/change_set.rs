// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change detection between two observed states.
//!
//! [`diff`] is the single place that decides whether a device changed. The
//! poller uses it to decide whether to emit a `report`, and the dispatcher
//! uses it to confirm that a write had an observable effect.
//!
//! # Examples
//!
//! ```
//! use climate_hub::state::{diff, DeviceState};
//! use climate_hub::types::Param;
//!
//! let old = DeviceState::new().with(Param::Power, false).with(Param::TargetTemperature, 20);
//! let new = DeviceState::new().with(Param::Power, true).with(Param::TargetTemperature, 20);
//!
//! let changes = diff(&old, &new);
//! assert_eq!(changes.len(), 1);
//! assert!(changes.get(Param::Power).is_some());
//!
//! assert!(diff(&new, &new).is_empty());
//! ```

use std::collections::BTreeMap;

use super::DeviceState;
use crate::types::{Param, ParamValue};

/// Old and new value of one changed parameter.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FieldChange {
    /// Value before the change, `None` if the parameter was unknown.
    pub old: Option<ParamValue>,
    /// Value after the change.
    pub new: ParamValue,
}

/// Parameters whose value differs between two states.
///
/// Serializes as `{"<param>": {"old": .., "new": ..}}` ordered by parameter.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: BTreeMap<Param, FieldChange>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a change set that restates every parameter of `new`.
    ///
    /// Used after a device comes back: clients only know the state from
    /// before the outage, so every current value is sent even when equal.
    #[must_use]
    pub fn restating(old: &DeviceState, new: &DeviceState) -> Self {
        let changes = new
            .iter()
            .map(|(param, value)| {
                (
                    param,
                    FieldChange {
                        old: old.get(param).cloned(),
                        new: value.clone(),
                    },
                )
            })
            .collect();
        Self { changes }
    }

    /// Returns the change for a parameter.
    #[must_use]
    pub fn get(&self, param: Param) -> Option<&FieldChange> {
        self.changes.get(&param)
    }

    /// Iterates changes in stable parameter order.
    pub fn iter(&self) -> impl Iterator<Item = (Param, &FieldChange)> {
        self.changes.iter().map(|(p, c)| (*p, c))
    }

    /// Returns the number of changed parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Computes the parameters of `new` whose value differs from `old`.
///
/// A parameter missing from `old` counts as changed. Parameters only present
/// in `old` are ignored. Numbers compare exactly.
#[must_use]
pub fn diff(old: &DeviceState, new: &DeviceState) -> ChangeSet {
    let changes = new
        .iter()
        .filter_map(|(param, value)| {
            let previous = old.get(param);
            (previous != Some(value)).then(|| {
                (
                    param,
                    FieldChange {
                        old: previous.cloned(),
                        new: value.clone(),
                    },
                )
            })
        })
        .collect();

    ChangeSet { changes }
}
