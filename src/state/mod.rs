// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state and change detection.
//!
//! [`DeviceState`] holds the parameters observed on a device. [`diff`]
//! compares two observations and yields a [`ChangeSet`].

mod change_set;
mod device_state;

pub use change_set::{ChangeSet, FieldChange, diff};
pub use device_state::DeviceState;
