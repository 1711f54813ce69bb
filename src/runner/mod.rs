pub mod actions;
pub mod availability;
pub mod cache;
pub mod catalog;
pub mod constraints;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod parser;
pub mod trace;
pub mod validator;
