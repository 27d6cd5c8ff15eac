pub mod connect;
pub mod import;
pub mod scan;
pub mod serve;

// Re-export command functions for convenience
pub use connect::connect;
pub use import::import;
pub use scan::scan;
pub use serve::serve;
