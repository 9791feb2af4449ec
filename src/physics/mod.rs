pub mod bc;
pub mod interface;
pub mod interpolation;
pub mod quantities;
