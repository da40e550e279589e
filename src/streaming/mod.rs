mod auth;
mod handlers;
mod notify;
mod pages;
mod server;
#[cfg(test)]
mod tests;

pub use auth::{credentials_match, SessionStore, SESSION_COOKIE};
pub use handlers::{parse_control_form, INVALID_CREDENTIALS};
pub use server::{ServerState, StreamServer, StreamServerBuilder};
