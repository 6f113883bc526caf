pub mod dialogue;
pub mod health;
pub mod refine;
pub mod scenarios;
pub mod solutions;
pub mod system;
