pub mod appointment;
pub mod billing;
pub mod enums;
pub mod page;
pub mod prescription;
pub mod profile;
pub mod wire;

pub use appointment::*;
pub use billing::*;
pub use enums::*;
pub use page::*;
pub use prescription::*;
pub use profile::*;
