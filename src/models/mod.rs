mod bulk;
mod product;
mod user;

pub use bulk::*;
pub use product::*;
pub use user::*;
