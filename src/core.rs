pub mod codec;
pub mod error;
pub mod record;
pub mod retry;
pub mod stage;
pub mod traits;

pub use self::error::*;
pub use self::record::*;
pub use self::retry::RetryPolicy;
pub use self::traits::*;
