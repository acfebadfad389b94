//! Console command set. The table built by `default_commands` is handed
//! to the executor explicitly.

mod clear;
mod connect;
mod exec;
mod exit;
mod export;
mod info;
mod pods;
mod sa;
mod scan;
mod set;
mod show;
mod use_cmd;

use std::sync::Arc;

use async_trait::async_trait;
use kstrike_core::session::Session;

use crate::output::Printer;

pub struct CommandContext {
    pub session: Arc<Session>,
    pub printer: Printer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Exit,
}

pub type CmdResult = Result<CommandOutcome, kstrike_core::Error>;

#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }
    fn description(&self) -> &'static str;
    fn usage(&self) -> &'static str;
    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> CmdResult;
}

pub fn default_commands() -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(connect::ConnectCmd),
        Arc::new(set::SetCmd),
        Arc::new(pods::PodsCmd),
        Arc::new(scan::ScanCmd),
        Arc::new(sa::SaCmd),
        Arc::new(use_cmd::UseCmd),
        Arc::new(exec::ExecCmd),
        Arc::new(show::ShowCmd),
        Arc::new(info::InfoCmd),
        Arc::new(export::ExportCmd),
        Arc::new(clear::ClearCmd),
        Arc::new(exit::ExitCmd),
    ]
}
