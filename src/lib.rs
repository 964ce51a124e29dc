// SPDX-License-Identifier: MIT

pub mod sandbox;
pub mod underwrite;
