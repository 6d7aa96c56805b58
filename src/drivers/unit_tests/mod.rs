// SPDX-License-Identifier: Apache-2.0

mod common;
mod fixture;
mod select;
