// Upload/poll controller, the page side of the client.

pub mod progress;
pub mod session;
pub mod upload;
