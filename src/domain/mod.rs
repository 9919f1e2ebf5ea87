/// Records owned by the authentication core

mod session_token;
mod user;

pub use session_token::{SessionToken, TokenState};
pub use user::UserRecord;
