pub mod core;
pub mod grades;
pub mod reports;
pub mod seating;
pub mod settings;
pub mod students;
pub mod subjects;
