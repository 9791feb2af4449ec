pub mod config;
pub mod discretization;
pub mod models;
pub mod numerics;
pub mod physics;
pub mod processing;
