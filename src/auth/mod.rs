//! Wallet sign-in: challenge messages, signature verification (EOA and
//! ERC-1271), one-time nonces and cookie sessions.

pub mod address;
pub mod chain;
pub mod message;
pub mod middleware;
pub mod nonce;
pub mod service;
pub mod session;
pub mod token;
pub mod verify;

pub use address::Address;
pub use middleware::{AppState, AuthenticatedAddress, SessionCookie};
pub use service::AuthService;
