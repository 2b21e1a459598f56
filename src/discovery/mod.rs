mod coordinator;
mod filters;
mod service_watcher;

pub use coordinator::*;
pub use filters::*;
