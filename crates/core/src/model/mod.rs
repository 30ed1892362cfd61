mod ids;
mod question;
mod report;
mod session;

pub use ids::{QuestionId, UserId};
pub use question::{QuestionBank, QuestionBankError, QuestionError, QuestionRecord};
pub use report::{AnswerDetail, TestReport};
pub use session::{
    MAX_WARNINGS, ParseTriggerError, Phase, SessionError, SubmitTrigger, TestOutcome, TestSession,
    TickOutcome, WarningOutcome,
};
