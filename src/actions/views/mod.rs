pub mod customer;
pub mod subscription;

pub use customer::*;
pub use subscription::*;
