//! Command implementations.

mod decode;
mod info;
mod run;
mod simulate;
mod validate;

pub use decode::run_decode;
pub use info::run_info;
pub use run::run_device;
pub use simulate::run_simulate;
pub use validate::run_validate;
