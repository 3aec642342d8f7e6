pub mod brep;
pub mod builder;
pub mod face_domain;
pub mod primitives;
