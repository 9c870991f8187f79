pub mod base;
pub mod configs;
pub mod gemini;
pub mod sse;

// Public rather than test-gated so the server's route tests can inject a
// scripted provider through the same constructor the binary uses.
pub mod mock;
