pub mod pipeline;
pub mod response;
pub mod schema;

pub use pipeline::{
    guard, require_authenticated, require_role, AuthState, PreDispatchHook, RequestClaims, RouteGuard,
};
pub use response::{ApiResponse, HandlerResult};
pub use schema::RequestSchema;
