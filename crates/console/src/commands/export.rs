use async_trait::async_trait;
use kstrike_core::Error;

use super::{CmdResult, Command, CommandContext, CommandOutcome};

pub struct ExportCmd;

#[async_trait]
impl Command for ExportCmd {
    fn name(&self) -> &'static str {
        "export"
    }

    fn description(&self) -> &'static str {
        "Export cached results as JSON"
    }

    fn usage(&self) -> &'static str {
        "export <pods|sa> [file]

Serialize the pod cache or the ServiceAccount records to JSON, to a
file or to stdout.

Examples:
  export sa findings.json
  export pods"
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> CmdResult {
        let p = &ctx.printer;

        let (json, count) = match args.first().map(String::as_str) {
            Some("pods") => {
                let pods = ctx.session.cached_pods();
                let json = serde_json::to_string_pretty(&pods)
                    .map_err(|e| Error::Repository(format!("serialize pods: {}", e)))?;
                (json, pods.len())
            }
            Some("sa") => {
                let records = ctx.session.store().get_all();
                let json = serde_json::to_string_pretty(&records)
                    .map_err(|e| Error::Repository(format!("serialize records: {}", e)))?;
                (json, records.len())
            }
            _ => return Err(Error::Config("usage: export <pods|sa> [file]".into())),
        };

        if count == 0 {
            p.warn("Nothing to export");
            return Ok(CommandOutcome::Continue);
        }

        match args.get(1) {
            Some(path) => {
                std::fs::write(path, &json)
                    .map_err(|e| Error::Repository(format!("write {}: {}", path, e)))?;
                p.success(&format!("Exported {} entries to {}", count, path));
            }
            None => println!("{}", json),
        }

        Ok(CommandOutcome::Continue)
    }
}
