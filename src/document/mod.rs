pub mod model;

pub use model::{Description, Document, Product};
