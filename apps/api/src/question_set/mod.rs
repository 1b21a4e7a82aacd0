// Question-set composition: the draft aggregate, duration arithmetic,
// the submit gate and the persistence pipeline.

pub mod documents;
pub mod draft;
pub mod duration;
pub mod handlers;
pub mod persistence;
pub mod validation;
