pub mod account;
pub mod report;
pub mod state;

pub use account::*;
pub use report::*;
pub use state::*;
