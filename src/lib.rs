pub mod backend;
pub mod descent;
pub mod engine;
pub mod error;
pub mod objective;
pub mod vis;
