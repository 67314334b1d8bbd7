pub mod bridge;
pub mod config;
pub mod document;
pub mod focus;
pub mod host;
pub mod location;
pub mod poi;
pub mod server;
#[doc(hidden)]
pub mod test_support;
pub mod toggles;
