pub mod helpers;
pub mod linker;

pub use helpers::output_path;
pub use linker::{LinkError, link, link_files};
