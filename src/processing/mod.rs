pub mod csv_writer;
pub mod summary;
pub mod vtk_writer;
