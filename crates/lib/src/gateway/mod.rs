//! Gateway: HTTP endpoint Slack posts interactions to.
//!
//! Each interaction is acknowledged immediately and processed on its own task; Slack sees the
//! outcome only through the follow-up Web API calls the step makes.

mod protocol;
mod server;

pub use protocol::{Health, InteractionForm};
pub use server::{run_gateway, GatewayState};
