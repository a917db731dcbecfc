// Processing backend abstraction: upload, status polling and download.

pub mod http_backend;
pub mod traits;
