mod account;
mod actor;
mod bookmark;
mod opportunity;
mod registration;
mod session;

pub use account::*;
pub use actor::*;
pub use bookmark::*;
pub use opportunity::*;
pub use registration::*;
pub use session::*;
