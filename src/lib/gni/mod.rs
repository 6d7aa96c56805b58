// SPDX-License-Identifier: Apache-2.0

mod model;
mod parse;
mod xml;

pub use self::model::{
    GlobalNetworkInfo, GniCluster, GniInstance, GniMido, GniNode,
    GniSecurityGroup, GniSubnet, GniVpc, GniVpcSubnet,
};
pub use self::parse::{gni_from_file, gni_from_str};
