pub mod course_generator;
pub mod course_shape;
pub mod enrichment;
pub mod json_repair;
pub mod premium;
pub mod quiz;
pub mod stats;

pub use course_generator::CourseGenerator;
pub use premium::PremiumService;
pub use quiz::QuizService;
