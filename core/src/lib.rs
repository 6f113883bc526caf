pub mod dialogue;
pub mod error;
pub mod scenarios;
pub mod solutions;
pub mod tools;
