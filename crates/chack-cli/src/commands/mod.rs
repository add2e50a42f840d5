pub mod check;
pub mod memory;
pub mod run;
