//! Domain types and the ports to the billing provider and callback bridge.

pub mod outcome;
pub mod ports;
pub mod product;
pub mod purchase;
