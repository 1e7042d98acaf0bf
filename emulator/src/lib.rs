pub mod memory;
pub mod processor;
pub mod registers;
pub mod trace;
pub mod vm;

pub use processor::Status;
pub use registers::Registers;
pub use vm::{ProcessorReport, RunReport, Vm, VmConfig, VmError, spaced_stack_pointers};
