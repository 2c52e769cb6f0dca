pub mod analyze;
pub mod triage;
pub mod util;

pub use analyze::*;
pub use triage::*;
pub use util::*;
