//! API 处理器

pub mod callback;
pub mod health;
pub mod providers;
pub mod status;
pub mod translation;

pub use callback::*;
pub use health::*;
pub use providers::*;
pub use status::*;
pub use translation::*;
