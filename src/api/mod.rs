pub mod cli;
pub mod http;

pub use cli::{Cli, CliError, CliHandler, Commands};
pub use http::{ApiError, ApiServer, AppState, DeleteResponse, StatusResponse, TrackingListResponse};
