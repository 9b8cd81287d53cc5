// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Names accepted by the enumerated climate settings.
//!
//! Choice values travel as [`ParamValue::Text`](super::ParamValue::Text);
//! these tables are what [`Param::kind`](super::Param::kind) checks them
//! against.

/// Operating modes.
pub const MODES: &[&str] = &["auto", "cool", "dry", "fan", "heat"];

/// Fan speeds.
pub const FAN_SPEEDS: &[&str] = &[
    "auto",
    "low",
    "medium_low",
    "medium",
    "medium_high",
    "high",
];

/// Horizontal louver positions.
pub const HORIZONTAL_SWINGS: &[&str] = &[
    "default",
    "full_swing",
    "left",
    "left_center",
    "center",
    "right_center",
    "right",
];

/// Vertical louver positions. `fixed_*` holds a position, `swing_*` sweeps
/// a region.
pub const VERTICAL_SWINGS: &[&str] = &[
    "default",
    "full_swing",
    "fixed_upper",
    "fixed_upper_middle",
    "fixed_middle",
    "fixed_lower_middle",
    "fixed_lower",
    "swing_upper",
    "swing_upper_middle",
    "swing_middle",
    "swing_lower_middle",
    "swing_lower",
];
