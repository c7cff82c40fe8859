pub mod config;
pub mod constants;

pub use config::{MachineProfile, MachineProfileError, load_machine_profile};
