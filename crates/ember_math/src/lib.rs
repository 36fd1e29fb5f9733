//! Math types shared by the ember crates.
//!
//! glam is re-exported so downstream crates agree on a single vector type.

pub use glam::*;

mod aabb;
mod interval;
mod ray;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;
