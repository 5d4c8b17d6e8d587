//! Domain models for the SlimCare system.

mod dose;
mod evolution;
mod finance;
mod inventory;
mod patient;

pub use dose::*;
pub use evolution::*;
pub use finance::*;
pub use inventory::*;
pub use patient::*;
