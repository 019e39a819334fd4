mod invocation;
mod message;

pub use invocation::*;
pub use message::*;
