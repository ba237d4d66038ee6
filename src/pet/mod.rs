pub mod level;
pub mod machine;
pub mod mood;
pub mod state;
