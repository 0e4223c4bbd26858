pub mod prepare;
pub mod summarize;
