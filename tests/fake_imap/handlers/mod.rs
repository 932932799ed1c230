//! IMAP command handlers for the fake server.
//!
//! Each handler lives in its own module and processes a single IMAP
//! command (CAPABILITY, FETCH, LOGIN, LOGOUT, SELECT/EXAMINE).


pub use capability::handle_capability;
pub use fetch::handle_fetch;
pub use login::{handle_login, REJECTION_TEXT, VALID_PASSWORD, VALID_USERNAME};
pub use logout::handle_logout;
pub use select::handle_select;
