// schoolcanon/src/commands/mod.rs

pub mod clean;
pub mod docs;
pub mod inspect;
pub mod run;
pub mod vintages;
