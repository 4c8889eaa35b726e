pub mod input;
pub mod mixquant_commands;
pub mod pipeline;
#[macro_use]
extern crate log;
