pub mod dispatch;
pub mod session;

pub use dispatch::{CompletionDispatcher, DispatchSummary};
pub use session::{FlowEngine, QuestionStep, SessionState, StartedSession, SubmitOutcome};
