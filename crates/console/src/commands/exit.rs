use async_trait::async_trait;

use super::{CmdResult, Command, CommandContext, CommandOutcome};

pub struct ExitCmd;

#[async_trait]
impl Command for ExitCmd {
    fn name(&self) -> &'static str {
        "exit"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["quit", "q"]
    }

    fn description(&self) -> &'static str {
        "Wipe memory and leave"
    }

    fn usage(&self) -> &'static str {
        "exit

Zeroes the in-memory repository and the session token, then leaves."
    }

    async fn execute(&self, _ctx: &CommandContext, _args: &[String]) -> CmdResult {
        Ok(CommandOutcome::Exit)
    }
}
