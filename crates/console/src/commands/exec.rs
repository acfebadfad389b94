use std::sync::Arc;

use async_trait::async_trait;
use kstrike_core::kubelet::{ExecOptions, KubeletClient};
use kstrike_core::pod::PodRecord;
use kstrike_core::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{CmdResult, Command, CommandContext, CommandOutcome};

const DEFAULT_SHELLS: &[&str] = &["/bin/bash", "/bin/sh", "/bin/ash", "/bin/zsh"];
const DEFAULT_FANOUT_CONCURRENCY: usize = 10;

pub struct ExecCmd;

#[derive(Default)]
struct ExecArgs {
    namespace: String,
    container: String,
    pod_name: String,
    interactive: bool,
    shell: String,
    all_pods: bool,
    filter_pods: Vec<String>,
    filter_ns: Vec<String>,
    concurrency: usize,
    command: Vec<String>,
}

#[async_trait]
impl Command for ExecCmd {
    fn name(&self) -> &'static str {
        "exec"
    }

    fn description(&self) -> &'static str {
        "Execute commands in containers via the kubelet"
    }

    fn usage(&self) -> &'static str {
        "exec [options] [pod] -- <command>
exec -it [pod]

Options:
  -n <namespace>      namespace of the target pod
  -c <container>      container name (default: first container)
  -it                 interactive shell (autodetects bash/sh/ash/zsh)
  --shell <path>      shell to start in interactive mode
  --all-pods          run the command in every cached running pod
  --filter <names>    exclude pods by name (comma separated, substring)
  --filter-ns <ns>    exclude namespaces (comma separated, substring)
  --concurrency <n>   parallel execs in --all-pods mode (default: 10)

Examples:
  exec -- whoami
  exec nginx -- cat /etc/passwd
  exec -it nginx
  exec --all-pods -- id
  exec --all-pods --filter-ns kube-system -- hostname"
    }

    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> CmdResult {
        let kubelet = ctx.session.get_kubelet_client()?;
        let mut parsed = parse_exec_args(args)?;

        if parsed.all_pods {
            if parsed.interactive {
                return Err(Error::Config("--all-pods cannot be interactive".into()));
            }
            if parsed.command.is_empty() {
                return Err(Error::Config("--all-pods requires a command".into()));
            }
            return self.exec_all_pods(ctx, &kubelet, &parsed).await;
        }

        if !parsed.interactive && parsed.command.is_empty() {
            return Err(Error::Config(
                "usage: exec [pod] -- <command>, or exec -it [pod]".into(),
            ));
        }

        self.resolve_target(ctx, &mut parsed);
        if parsed.pod_name.is_empty() {
            return Err(Error::Config(
                "no target pod: name one, or pick an SA with 'use'".into(),
            ));
        }
        if parsed.namespace.is_empty() {
            parsed.namespace = "default".into();
        }

        if parsed.interactive {
            self.exec_interactive(ctx, &kubelet, &parsed).await
        } else {
            self.exec_single(ctx, &kubelet, &parsed).await
        }
    }
}

impl ExecCmd {
    /// Fill pod/namespace/container from the selected SA or the pod cache.
    fn resolve_target(&self, ctx: &CommandContext, parsed: &mut ExecArgs) {
        if parsed.pod_name.is_empty() {
            if let Some(sa) = ctx.session.current_sa() {
                if let Some(pod) = sa.pods.first() {
                    parsed.pod_name = pod.name.clone();
                    if parsed.namespace.is_empty() {
                        parsed.namespace = pod.namespace.clone();
                    }
                    if parsed.container.is_empty() {
                        parsed.container = pod.container.clone();
                    }
                    ctx.printer.info(&format!(
                        "Using pod {}/{} (from current SA)",
                        parsed.namespace, parsed.pod_name
                    ));
                }
            }
        }

        if parsed.pod_name.is_empty() {
            return;
        }

        for pod in ctx.session.cached_pods() {
            if pod.name != parsed.pod_name {
                continue;
            }
            if !parsed.namespace.is_empty() && pod.namespace != parsed.namespace {
                continue;
            }
            if parsed.namespace.is_empty() {
                parsed.namespace = pod.namespace.clone();
            }
            if parsed.container.is_empty() {
                if let Some(c) = pod.containers.first() {
                    parsed.container = c.name.clone();
                }
            }
            break;
        }
    }

    async fn exec_single(
        &self,
        ctx: &CommandContext,
        kubelet: &KubeletClient,
        parsed: &ExecArgs,
    ) -> CmdResult {
        let p = &ctx.printer;
        let opts = ExecOptions::command(
            parsed.namespace.clone(),
            parsed.pod_name.clone(),
            parsed.container.clone(),
            parsed.command.clone(),
        );

        let result = kubelet.exec(&opts).await.map_err(|e| Error::Exec {
            namespace: parsed.namespace.clone(),
            pod: parsed.pod_name.clone(),
            message: e.to_string(),
        })?;

        let stdout = result.stdout_text();
        if !stdout.is_empty() {
            print!("{}", stdout);
            if !stdout.ends_with('\n') {
                println!();
            }
        }
        let stderr = result.stderr_text();
        if !stderr.is_empty() {
            eprint!("{}", stderr);
            if !stderr.ends_with('\n') {
                eprintln!();
            }
        }
        if let Some(err) = result.error {
            p.error(&err);
        }

        Ok(CommandOutcome::Continue)
    }

    async fn exec_interactive(
        &self,
        ctx: &CommandContext,
        kubelet: &KubeletClient,
        parsed: &ExecArgs,
    ) -> CmdResult {
        let p = &ctx.printer;

        let shell = if !parsed.shell.is_empty() {
            parsed.shell.clone()
        } else {
            p.info("Detecting available shells...");
            let found = self.detect_shells(kubelet, parsed).await;
            let Some(shell) = found.first().cloned() else {
                return Err(Error::Exec {
                    namespace: parsed.namespace.clone(),
                    pod: parsed.pod_name.clone(),
                    message: "no usable shell found, pass --shell <path>".into(),
                });
            };
            p.success(&format!("Available shells: {}", found.join(", ")));
            shell
        };

        p.info(&format!("Starting {} (Ctrl-D or 'exit' to leave)", shell));
        p.blank();

        let opts = ExecOptions::interactive(
            parsed.namespace.clone(),
            parsed.pod_name.clone(),
            parsed.container.clone(),
            vec![shell],
        );
        kubelet.exec_interactive(&opts).await?;

        Ok(CommandOutcome::Continue)
    }

    async fn detect_shells(&self, kubelet: &KubeletClient, parsed: &ExecArgs) -> Vec<String> {
        let mut available = Vec::new();

        for shell in DEFAULT_SHELLS {
            let opts = ExecOptions::command(
                parsed.namespace.clone(),
                parsed.pod_name.clone(),
                parsed.container.clone(),
                vec!["test".into(), "-x".into(), shell.to_string()],
            );
            if let Ok(result) = kubelet.exec(&opts).await {
                if result.error.is_none() {
                    available.push(shell.to_string());
                }
            }
        }

        // Last resort: ask `which` for the bare names.
        if available.is_empty() {
            for shell in DEFAULT_SHELLS {
                let name = shell.rsplit('/').next().unwrap_or(shell);
                let opts = ExecOptions::command(
                    parsed.namespace.clone(),
                    parsed.pod_name.clone(),
                    parsed.container.clone(),
                    vec!["which".into(), name.to_string()],
                );
                if let Ok(result) = kubelet.exec(&opts).await {
                    let path = result.stdout_text().trim().to_string();
                    if result.error.is_none() && !path.is_empty() {
                        available.push(path);
                    }
                }
            }
        }

        available
    }

    async fn exec_all_pods(
        &self,
        ctx: &CommandContext,
        kubelet: &KubeletClient,
        parsed: &ExecArgs,
    ) -> CmdResult {
        let p = &ctx.printer;

        let cached = ctx.session.cached_pods();
        if cached.is_empty() {
            return Err(Error::Config(
                "no cached pods, run 'pods' or 'scan' first".into(),
            ));
        }

        let targets: Vec<PodRecord> = cached
            .into_iter()
            .filter(|pod| pod.is_running())
            .filter(|pod| parsed.namespace.is_empty() || pod.namespace == parsed.namespace)
            .filter(|pod| !matches_filter(&pod.namespace, &parsed.filter_ns))
            .filter(|pod| !matches_filter(&pod.name, &parsed.filter_pods))
            .collect();

        if targets.is_empty() {
            return Err(Error::Config("no pods match the filters".into()));
        }

        let concurrency = if parsed.concurrency > 0 {
            parsed.concurrency
        } else {
            DEFAULT_FANOUT_CONCURRENCY
        };
        p.info(&format!(
            "Executing on {} pods (concurrency: {})...",
            targets.len(),
            concurrency
        ));
        p.blank();

        struct Item {
            coordinate: String,
            stdout: String,
            error: Option<String>,
        }

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();
        for pod in targets {
            let kubelet = kubelet.clone();
            let command = parsed.command.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let container = pod
                    .containers
                    .first()
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                let opts = ExecOptions::command(
                    pod.namespace.clone(),
                    pod.name.clone(),
                    container,
                    command,
                );
                let coordinate = pod.coordinate();
                match kubelet.exec(&opts).await {
                    Ok(result) => Item {
                        coordinate,
                        stdout: result.stdout_text().into_owned(),
                        error: result.error,
                    },
                    Err(e) => Item {
                        coordinate,
                        stdout: String::new(),
                        error: Some(e.to_string()),
                    },
                }
            });
        }

        let mut items = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok(item) = joined {
                items.push(item);
            }
        }
        items.sort_by(|a, b| a.coordinate.cmp(&b.coordinate));

        let mut ok = 0;
        let mut failed = 0;
        for item in &items {
            match &item.error {
                None => {
                    ok += 1;
                    p.success(&item.coordinate);
                    for line in item.stdout.trim_end().lines() {
                        println!("    {}", line);
                    }
                }
                Some(err) => {
                    failed += 1;
                    p.error(&format!("{}: {}", item.coordinate, err));
                }
            }
        }

        p.blank();
        p.info(&format!("Completed: {} success, {} failed", ok, failed));

        Ok(CommandOutcome::Continue)
    }
}

fn parse_exec_args(args: &[String]) -> Result<ExecArgs, Error> {
    let mut parsed = ExecArgs::default();

    let cmd_start = args.iter().position(|a| a == "--");
    let opts = match cmd_start {
        Some(i) => {
            parsed.command = args[i + 1..].to_vec();
            &args[..i]
        }
        None => args,
    };

    let mut i = 0;
    while i < opts.len() {
        let take_value = |i: &mut usize| -> Result<String, Error> {
            *i += 1;
            opts.get(*i)
                .cloned()
                .ok_or_else(|| Error::Config(format!("{} needs a value", opts[*i - 1])))
        };

        match opts[i].as_str() {
            "-n" => parsed.namespace = take_value(&mut i)?,
            "-c" => parsed.container = take_value(&mut i)?,
            "-it" | "-ti" | "--interactive" => parsed.interactive = true,
            "--shell" => parsed.shell = take_value(&mut i)?,
            "--all-pods" => parsed.all_pods = true,
            "--filter" => parsed.filter_pods = split_filter(&take_value(&mut i)?),
            "--filter-ns" => parsed.filter_ns = split_filter(&take_value(&mut i)?),
            "--concurrency" => {
                let raw = take_value(&mut i)?;
                parsed.concurrency = raw
                    .parse()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| Error::Config(format!("invalid concurrency: {}", raw)))?;
            }
            other if !other.starts_with('-') && parsed.pod_name.is_empty() => {
                parsed.pod_name = other.to_string();
            }
            other => {
                return Err(Error::Config(format!("unknown exec option: {}", other)));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

fn split_filter(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn matches_filter(value: &str, filters: &[String]) -> bool {
    filters.iter().any(|f| value == f || value.contains(f.as_str()))
}
