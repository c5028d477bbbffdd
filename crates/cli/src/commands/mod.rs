pub mod migrate;

pub use migrate::ConnectionArgs;
