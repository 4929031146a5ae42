pub mod convert;
pub mod health;

pub use convert::convert;
pub use health::{health_live, health_ready};
