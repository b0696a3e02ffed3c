pub mod accumulator;
pub mod domain;
pub mod ports;
pub mod tasks;
pub mod turn;

pub use accumulator::{AccumulatedItem, AccumulatorEffect, StreamAccumulator, ToolCallStatus};
pub use domain::{
    Application, ApplicationPlan, ApplicationState, ApplicationStatus, ApplicationTask,
    AuthSession, ChatMessage, Conversation, MessageRole, Pathway, Profile, Program,
    Recommendation, User, UserCredentials,
};
pub use ports::{
    DatabaseService, EventStream, PathwayGenerationService, PlanGenerationService, PortError,
    PortResult, ProgramGenerationService, TitleGenerationService, TurnStreamService,
    VectorStoreService,
};
pub use tasks::{TaskPatch, TaskUpdate};
pub use turn::{FunctionOutput, ToolDescriptor, TurnMessage, TurnRequest};
