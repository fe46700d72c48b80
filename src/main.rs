mod cli;
mod shell_completion;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::debug;

use cli::{Cli, Command};
use tmuxctl::config::Config;
use tmuxctl::{
    CaptureOptions, KeystrokeLauncher, Orientation, Pane, Process, ProcessControl,
    SplitOptions, SystemProcessTable, Tmux, TmuxExecutor, Window,
};

fn config_source_label(config_path: Option<&Path>) -> String {
    config_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults, no .tmuxctl/config.toml found)".to_string())
}

fn push_kv(output: &mut String, key: &str, value: impl std::fmt::Display) {
    output.push_str(&format!("  {key:<20} {value}\n"));
}

fn render_config_human(config: &Config, config_path: Option<&Path>) -> String {
    let mut output = String::new();
    output.push_str("Tmux\n");
    push_kv(&mut output, "binary", &config.tmux.binary);
    push_kv(
        &mut output,
        "socket_name",
        config.tmux.socket_name.as_deref().unwrap_or("(default)"),
    );
    push_kv(
        &mut output,
        "socket_path",
        config.tmux.socket_path.as_deref().unwrap_or("(default)"),
    );
    if config.tmux.command_timeout_ms == 0 {
        push_kv(&mut output, "command_timeout", "(none)");
    } else {
        push_kv(
            &mut output,
            "command_timeout",
            format!("{}ms", config.tmux.command_timeout_ms),
        );
    }
    output.push('\n');

    output.push_str("Spawn\n");
    push_kv(
        &mut output,
        "settle_delay",
        format!("{}ms", config.spawn.settle_delay_ms),
    );
    push_kv(
        &mut output,
        "pid_poll_timeout",
        format!("{}ms", config.spawn.pid_poll_timeout_ms),
    );
    push_kv(
        &mut output,
        "pid_poll_initial",
        format!("{}ms", config.spawn.pid_poll_initial_ms),
    );
    push_kv(
        &mut output,
        "pid_poll_max",
        format!("{}ms", config.spawn.pid_poll_max_ms),
    );
    output.push('\n');

    output.push_str("Source Path\n");
    push_kv(&mut output, "path", config_source_label(config_path));

    output
}

fn render_config_json(config: &Config, config_path: Option<&Path>) -> Result<String> {
    let payload = serde_json::json!({
        "tmux": &config.tmux,
        "spawn": &config.spawn,
        "source_path": config_source_label(config_path)
    });

    serde_json::to_string_pretty(&payload).context("failed to serialize config to JSON")
}

fn render_windows(windows: &[Window]) -> String {
    windows
        .iter()
        .map(|w| {
            let marker = if w.active { " (active)" } else { "" };
            format!("{}: {} [{}]{marker}\n", w.index, w.name, w.id)
        })
        .collect()
}

fn render_panes(panes: &[Pane]) -> String {
    panes
        .iter()
        .map(|p| {
            let marker = if p.active { " (active)" } else { "" };
            format!("{}: {} {:?} pid {}{marker}\n", p.index, p.id, p.title, p.pid)
        })
        .collect()
}

fn render_processes(processes: &[Process]) -> String {
    processes
        .iter()
        .map(|p| format!("{}\t{}\n", p.pid, p.cmdline))
        .collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output to JSON")?
    );
    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(ref name) = cli.socket_name {
        config.tmux.socket_name = Some(name.clone());
        // An explicit name on the command line beats a path from the file.
        config.tmux.socket_path = None;
    }
    if let Some(ref bin) = cli.tmux_bin {
        config.tmux.binary = bin.clone();
    }
}

fn find_window(tmux: &Tmux, session: &str, window: &str) -> Result<Window> {
    let session = tmux.session(session)?;
    Ok(tmux.window(&session, window)?)
}

fn find_pane(tmux: &Tmux, session: &str, window: &str, pane: Option<&str>) -> Result<Pane> {
    let window = find_window(tmux, session, window)?;
    Ok(tmux.resolve_pane(&window, pane)?)
}

fn process_control<'a>(
    tmux: &'a Tmux<TmuxExecutor>,
    config: &Config,
) -> ProcessControl<KeystrokeLauncher<'a, TmuxExecutor>, SystemProcessTable> {
    let launcher = KeystrokeLauncher::new(tmux).with_timing(config.spawn.timing());
    ProcessControl::new(launcher, SystemProcessTable::new())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "tmuxctl=warn",
        1 => "tmuxctl=info",
        2 => "tmuxctl=debug",
        _ => "tmuxctl=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir().context("failed to get current directory (was it deleted?)")?;
    let (mut config, config_path) = Config::load(&cwd)?;
    apply_overrides(&mut config, &cli);

    match config_path {
        Some(ref p) => debug!("loaded config from {}", p.display()),
        None => debug!("no .tmuxctl/config.toml found, using defaults"),
    }

    let tmux = Tmux::new(config.tmux.executor());

    match cli.command {
        Command::Sessions { json } => {
            let sessions = tmux.list_sessions()?;
            if json {
                print_json(&sessions)?;
            } else {
                for session in &sessions {
                    println!("{}", session.name);
                }
            }
        }
        Command::NewSession { name } => {
            let session = tmux.new_session(&name)?;
            println!("{}", session.name);
        }
        Command::KillSession { name } => {
            let session = tmux.session(&name)?;
            tmux.kill_session(&session)?;
        }
        Command::Windows { session, json } => {
            let windows = tmux.windows(&tmux.session(&session)?)?;
            if json {
                print_json(&windows)?;
            } else {
                print!("{}", render_windows(&windows));
            }
        }
        Command::NewWindow { session, name } => {
            let window = tmux.new_window(&tmux.session(&session)?, &name)?;
            print!("{}", render_windows(std::slice::from_ref(&window)));
        }
        Command::KillWindow { session, name } => {
            tmux.kill_window_by_name(&tmux.session(&session)?, &name)?;
        }
        Command::Panes {
            session,
            window,
            json,
        } => {
            let panes = tmux.panes(&find_window(&tmux, &session, &window)?)?;
            if json {
                print_json(&panes)?;
            } else {
                print!("{}", render_panes(&panes));
            }
        }
        Command::Split {
            session,
            window,
            pane,
            horizontal,
            title,
            json,
        } => {
            let window = find_window(&tmux, &session, &window)?;
            let opts = SplitOptions {
                orientation: if horizontal {
                    Orientation::Horizontal
                } else {
                    Orientation::Vertical
                },
                title,
            };
            let new_pane = tmux.split_window(&window, pane.as_deref(), &opts)?;
            if json {
                print_json(&new_pane)?;
            } else {
                print!("{}", render_panes(std::slice::from_ref(&new_pane)));
            }
        }
        Command::KillPane {
            session,
            window,
            pane,
        } => {
            let window = find_window(&tmux, &session, &window)?;
            tmux.kill_pane(&tmux.pane(&window, &pane)?)?;
        }
        Command::SendKeys {
            session,
            window,
            pane,
            keys,
        } => {
            let pane = find_pane(&tmux, &session, &window, Some(&pane))?;
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            print!("{}", tmux.send_keys(&pane, &keys)?);
        }
        Command::Capture {
            session,
            window,
            pane,
            start,
            end,
        } => {
            let pane = find_pane(&tmux, &session, &window, pane.as_deref())?;
            let opts = CaptureOptions {
                start_line: start,
                end_line: end,
                ..CaptureOptions::default()
            };
            print!("{}", tmux.capture_pane(&pane, &opts)?);
        }
        Command::Start {
            session,
            window,
            pane,
            json,
            cmd,
        } => {
            let pane = find_pane(&tmux, &session, &window, pane.as_deref())?;
            let launcher = KeystrokeLauncher::new(&tmux).with_timing(config.spawn.timing());
            let (program, args) = cmd
                .split_first()
                .context("no command given after --")?;
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            let process = launcher.start_process(&pane, program, &args)?;
            if json {
                print_json(&process)?;
            } else {
                println!("{}", process.pid);
            }
        }
        Command::Restart {
            session,
            window,
            pid,
            pane,
            json,
            cmd,
        } => {
            let pane = find_pane(&tmux, &session, &window, pane.as_deref())?;
            let control = process_control(&tmux, &config);
            let mut process = Process {
                pid,
                cmdline: cmd.join(" "),
                pane,
            };
            control
                .restart(&mut process)
                .with_context(|| format!("failed to restart process {pid}"))?;
            if json {
                print_json(&process)?;
            } else {
                println!("{}", process.pid);
            }
        }
        Command::Processes {
            session,
            window,
            pane,
            json,
        } => {
            let pane = find_pane(&tmux, &session, &window, pane.as_deref())?;
            let processes = process_control(&tmux, &config).pane_processes(&pane)?;
            if json {
                print_json(&processes)?;
            } else {
                print!("{}", render_processes(&processes));
            }
        }
        Command::Pids { session, json } => {
            let pids = tmux.session_pane_pids(&tmux.session(&session)?)?;
            if json {
                print_json(&pids)?;
            } else {
                for pid in pids {
                    println!("{pid}");
                }
            }
        }
        Command::Config { json } => {
            if json {
                println!("{}", render_config_json(&config, config_path.as_deref())?);
            } else {
                print!("{}", render_config_human(&config, config_path.as_deref()));
            }
        }
        Command::Completions { shell } => shell_completion::print(shell)?,
    }

    Ok(())
}
