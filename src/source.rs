pub mod bus;
pub mod file;

pub use self::bus::{BusCursor, BusSource};
pub use self::file::FileSource;
