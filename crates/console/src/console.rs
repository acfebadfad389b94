//! Line executor for the interactive console. The command table is passed
//! in at construction; nothing registers itself globally.

use std::collections::HashMap;
use std::sync::Arc;

use crate::commands::{Command, CommandContext, CommandOutcome};
use crate::output::table;

pub struct Executor {
    ctx: CommandContext,
    commands: Vec<Arc<dyn Command>>,
    index: HashMap<&'static str, usize>,
}

impl Executor {
    pub fn new(ctx: CommandContext, commands: Vec<Arc<dyn Command>>) -> Self {
        let mut index = HashMap::new();
        for (i, cmd) in commands.iter().enumerate() {
            index.insert(cmd.name(), i);
            for alias in cmd.aliases() {
                index.insert(*alias, i);
            }
        }
        Executor { ctx, commands, index }
    }

    pub async fn execute(&self, input: &str) -> CommandOutcome {
        let args = parse_args(input);
        let Some(name) = args.first() else {
            return CommandOutcome::Continue;
        };

        if name == "help" || name == "?" {
            self.print_help(&args[1..]);
            return CommandOutcome::Continue;
        }

        match self.index.get(name.as_str()) {
            Some(&i) => match self.commands[i].execute(&self.ctx, &args[1..]).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.ctx.printer.error(&e.to_string());
                    CommandOutcome::Continue
                }
            },
            None => {
                self.ctx
                    .printer
                    .error(&format!("unknown command: {} (try 'help')", name));
                CommandOutcome::Continue
            }
        }
    }

    fn print_help(&self, args: &[String]) {
        if let Some(name) = args.first() {
            match self.index.get(name.as_str()) {
                Some(&i) => println!("{}\n", self.commands[i].usage()),
                None => self.ctx.printer.error(&format!("unknown command: {}", name)),
            }
            return;
        }

        let rows: Vec<Vec<String>> = self
            .commands
            .iter()
            .map(|c| {
                let mut name = c.name().to_string();
                if !c.aliases().is_empty() {
                    name = format!("{} ({})", name, c.aliases().join(", "));
                }
                vec![name, c.description().to_string()]
            })
            .collect();

        println!();
        table::print(&["COMMAND", "DESCRIPTION"], &rows);
        println!("\nhelp <command> shows detailed usage\n");
    }
}

/// Split a console line into argv, honoring single and double quotes.
pub fn parse_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in input.trim().chars() {
        match c {
            '"' | '\'' => match quote {
                Some(q) if q == c => quote = None,
                Some(_) => current.push(c),
                None => quote = Some(c),
            },
            ' ' | '\t' if quote.is_none() => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(parse_args("exec nginx -- whoami"), vec!["exec", "nginx", "--", "whoami"]);
    }

    #[test]
    fn quotes_keep_arguments_together() {
        assert_eq!(
            parse_args(r#"exec -- sh -c "id; cat /etc/shadow""#),
            vec!["exec", "--", "sh", "-c", "id; cat /etc/shadow"]
        );
        assert_eq!(parse_args("set token 'a b'"), vec!["set", "token", "a b"]);
    }

    #[test]
    fn nested_quote_characters_survive() {
        assert_eq!(parse_args(r#"echo "it's fine""#), vec!["echo", "it's fine"]);
    }

    #[test]
    fn empty_input_yields_no_args() {
        assert!(parse_args("   ").is_empty());
    }
}
