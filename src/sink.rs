pub mod bus;
pub mod file;

pub use self::bus::BusSink;
pub use self::file::FileSink;
