pub mod assessment;
pub mod lenient;
pub mod position;
pub mod question_set;
