//! Test session orchestration: question draw, countdown timer, integrity
//! monitoring, and the flow that arbitrates the three submit triggers.

pub mod draw;
pub mod flow;
pub mod monitor;
pub mod timer;
pub mod view;

pub use draw::draw_questions;
pub use flow::TestFlow;
pub use monitor::{IntegrityMonitor, IntegritySignal};
pub use timer::CountdownTimer;
pub use view::{QuestionView, TestView};
