pub mod currents_heating;
pub mod laplace;
