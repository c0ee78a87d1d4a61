mod http;

pub use http::{router, AppState, Server};
