pub mod cycle_guard;
pub mod dependency_service;
pub mod evaluator;
pub mod view;

pub use dependency_service::{
    BlockedTask, DependencyService, ProjectProgress, RemoveOutcome, ServiceSettings,
};
pub use evaluator::{BlockingStatus, DanglingPolicy, EdgeEvaluation, EvaluationOptions};
pub use view::{DependencyView, PredecessorView, SuccessorView};
