//! The agent loop: the heart of agentloop.
//!
//! The agent follows a **Generate → Execute tools → Repeat** cycle:
//!
//! 1. **Seed** the conversation with the agent's instructions and the input
//! 2. **Send to the model** via the configured provider
//! 3. **If tool calls**: execute each in order, append the exchange, loop back to step 2
//! 4. **If text**: coerce it into the output schema (when declared) and return
//!
//! The loop continues until the model responds without tool calls or the
//! iteration limit is reached. [`Agent::astream`] runs the same cycle over
//! the provider's event stream and forwards events to the caller as they
//! happen.

pub mod builder;
pub mod loop_runner;
pub mod output;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use builder::{Agent, AgentBuilder};
pub use loop_runner::{LoopState, RunReport};
pub use output::{AgentOutput, ITERATION_LIMIT_MESSAGE, OutputSchema, StructuredOutput, TypedOutput};
