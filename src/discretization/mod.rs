pub mod fe;
pub mod generator;
pub mod mesh;
