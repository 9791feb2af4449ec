pub mod solver;
pub mod sparse;
pub mod timing;
pub mod transient;
