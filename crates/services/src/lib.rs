#![forbid(unsafe_code)]

pub mod auth;
pub mod bank;
pub mod dashboard;
pub mod error;
pub mod sessions;

pub use aptitude_core::Clock;

pub use auth::{AuthService, AuthSession, RegisterInput};
pub use bank::load_question_bank;
pub use dashboard::DashboardService;
pub use error::{AuthError, BankLoadError, FlowError, ServicesError};

pub use sessions::{
    CountdownTimer, IntegrityMonitor, IntegritySignal, QuestionView, TestFlow, TestView,
};
