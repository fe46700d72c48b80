use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "tmuxctl",
    about = "Drive tmux sessions, windows, panes and the processes inside them",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// tmux server socket name (-L), overrides the config file
    #[arg(long, global = true)]
    pub socket_name: Option<String>,

    /// tmux binary to run, overrides the config file
    #[arg(long, global = true)]
    pub tmux_bin: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List sessions on the server
    Sessions {
        #[arg(long)]
        json: bool,
    },

    /// Create a detached session
    NewSession { name: String },

    /// Kill a session and everything in it
    KillSession { name: String },

    /// List windows in a session
    Windows {
        session: String,
        #[arg(long)]
        json: bool,
    },

    /// Create a window in a session
    NewWindow { session: String, name: String },

    /// Kill a window by name
    KillWindow { session: String, name: String },

    /// List panes in a window
    Panes {
        session: String,
        window: String,
        #[arg(long)]
        json: bool,
    },

    /// Split a pane (the active one unless --pane is given)
    Split {
        session: String,
        window: String,

        /// Pane ID to split, e.g. %3
        #[arg(long)]
        pane: Option<String>,

        /// Place the new pane to the right instead of below
        #[arg(long)]
        horizontal: bool,

        /// Title for the new pane
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Kill a pane
    KillPane {
        session: String,
        window: String,
        pane: String,
    },

    /// Send raw keys to a pane (tmux key names such as Enter or C-c)
    SendKeys {
        session: String,
        window: String,
        pane: String,
        #[arg(required = true, num_args = 1..)]
        keys: Vec<String>,
    },

    /// Print the visible contents of a pane
    Capture {
        session: String,
        window: String,

        #[arg(long)]
        pane: Option<String>,

        /// First line to capture; negative values reach into history
        #[arg(short = 'S', long = "start", allow_negative_numbers = true)]
        start: Option<i64>,

        /// Last line to capture
        #[arg(short = 'E', long = "end", allow_negative_numbers = true)]
        end: Option<i64>,
    },

    /// Start a command in a pane and report its PID
    Start {
        session: String,
        window: String,

        #[arg(long)]
        pane: Option<String>,

        #[arg(long)]
        json: bool,

        /// Command and arguments
        #[arg(last = true, required = true)]
        cmd: Vec<String>,
    },

    /// Kill a process (if alive) and start its command line again
    Restart {
        session: String,
        window: String,

        /// PID of the running process
        #[arg(long)]
        pid: u32,

        #[arg(long)]
        pane: Option<String>,

        #[arg(long)]
        json: bool,

        /// Command to use if the process is already gone
        #[arg(last = true)]
        cmd: Vec<String>,
    },

    /// List the pane shell and its direct child processes
    Processes {
        session: String,
        window: String,

        #[arg(long)]
        pane: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// List the shell PIDs of every pane in a session
    Pids {
        session: String,
        #[arg(long)]
        json: bool,
    },

    /// Show effective configuration
    Config {
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
