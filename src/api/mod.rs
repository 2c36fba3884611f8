pub mod ors;
pub mod server;

pub use ors::OrsClient;
pub use server::start_api_server;
