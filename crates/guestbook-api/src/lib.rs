pub mod auth;
pub mod cache;
pub mod convert;
pub mod error;
pub mod extract;
pub mod guard;
pub mod messages;
pub mod middleware;
pub mod replies;
pub mod router;
pub mod validate;
