pub mod generic6502;
pub mod registry;

pub use generic6502::Generic6502;
