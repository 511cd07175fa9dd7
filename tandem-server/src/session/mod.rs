mod registry;
mod session;

pub use registry::*;
pub use session::*;
