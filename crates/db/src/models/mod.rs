//! Row structs (`FromRow`) and request DTOs, one module per entity.

pub mod clip;
pub mod event;
pub mod job;
pub mod mapping;
pub mod matches;
pub mod metric;
pub mod review;
pub mod track;
