use async_trait::async_trait;

use super::{CmdResult, Command, CommandContext, CommandOutcome};

pub struct ClearCmd;

#[async_trait]
impl Command for ClearCmd {
    fn name(&self) -> &'static str {
        "clear"
    }

    fn description(&self) -> &'static str {
        "Drop the pod cache and the SA selection"
    }

    fn usage(&self) -> &'static str {
        "clear

Drops the cached pod enumeration and the current SA selection. The
ServiceAccount repository is kept; 'exit' wipes everything."
    }

    async fn execute(&self, ctx: &CommandContext, _args: &[String]) -> CmdResult {
        ctx.session.clear_cache();
        ctx.printer.success("Cache cleared");
        Ok(CommandOutcome::Continue)
    }
}
