//! These models represent a patient conversation as it moves through the system.
//!
//! The same message shape appears in three places:
//! - the relay request body, sent from a client to the server
//! - the provider payload, sent from the server to the generation API
//! - the persisted conversation record, written by the client between turns
//!
//! All three use the internal structs here and convert at the edges. The wire
//! role vocabulary comes from the provider ("user"/"model"), so the serde
//! names follow it rather than the more common "assistant".
pub mod attachment;
pub mod conversation;
pub mod message;
pub mod role;
