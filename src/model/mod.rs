pub mod photo;

pub use photo::{NewPhoto, PhotoId, PhotoRecord};
