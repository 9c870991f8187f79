pub mod accumulator;
pub mod errors;
pub mod models;
pub mod persona;
pub mod providers;
pub mod store;
pub mod text;
