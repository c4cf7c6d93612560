// src/utils/mod.rs
pub mod logbook;
