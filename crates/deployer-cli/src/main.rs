#[macro_use]
extern crate hiro_system_kit;

#[macro_use]
extern crate serde_derive;

#[macro_use]
mod macros;

pub mod cli;
pub mod manifest;

fn main() {
    cli::main();
}
