//! Pairing engine: find-or-wait matching and the per-user session
//! lifecycle (find / next / stop / relay).

pub mod matcher;
pub mod session;

pub use matcher::Matcher;
pub use session::SessionController;
