pub mod api;
pub mod builder;
pub mod handler;
pub mod listener;
pub mod response;

pub use api::SiteApi;
pub use builder::ServerBuilder;
pub use handler::RequestHandler;
pub use response::ApiError;
