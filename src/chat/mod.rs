pub mod context;
pub mod core;
pub mod db;
pub mod models;
pub mod stream;

pub use self::context::*;
pub use self::core::*;
pub use self::db::*;
pub use self::models::*;
pub use self::stream::*;
