pub mod transform;
pub mod vertex;
