pub mod context;
pub mod error;
pub mod eval;
pub mod functions;
pub mod group;
pub mod parse;
pub mod sample;
pub mod token;
pub mod variables;
