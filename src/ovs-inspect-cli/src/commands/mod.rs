pub mod bridge;
pub mod configure;
pub mod conntrack;
pub mod containers;
pub mod dpif;
pub mod fdb;
pub mod netdev;
pub mod raw;
pub mod udpif;

mod render;

#[cfg(test)]
pub mod testutil;
