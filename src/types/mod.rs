// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for climate device control.
//!
//! # Types
//!
//! - [`MacAddress`] - Hardware address, the stable device key
//! - [`Param`] - Named device parameter with its [`ParamKind`]
//! - [`ParamValue`] - Typed parameter value
//! - [`mode`] - Names accepted by the enumerated settings

mod mac;
pub mod mode;
mod param;

pub use mac::MacAddress;
pub use param::{Param, ParamKind, ParamValue};
