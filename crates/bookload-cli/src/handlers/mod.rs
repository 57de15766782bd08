//! Command handlers

pub mod inspect;
pub mod run;
