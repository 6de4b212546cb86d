//! Application configuration and constants.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

/// Default page the chat server is served from.
pub const DEFAULT_PAGE_URL: &str = "http://127.0.0.1:8000";

/// Command line arguments.
#[derive(Debug, Clone, Parser)]
#[command(name = "planner-chat", version, about = "Terminal chat client for the planner assistant")]
pub struct Args {
    /// Page URL of the chat server; the socket scheme follows its scheme.
    #[arg(long, env = "PLANNER_CHAT_URL", default_value = DEFAULT_PAGE_URL)]
    pub url: Url,

    /// Path of the socket endpoint on the server.
    #[arg(long, default_value = "/ws")]
    pub socket_path: String,

    /// Write logs to this file (logging is discarded otherwise).
    #[arg(long, env = "PLANNER_CHAT_LOG")]
    pub log_file: Option<PathBuf>,

    /// Delay between two animated thinking lines.
    #[arg(long, default_value_t = 100)]
    pub thought_delay_ms: u64,
}

pub struct Config {
    /// Main loop tick rate in milliseconds (target 60 FPS = ~16ms)
    pub tick_rate_ms: u64,

    /// Fixed gap between two displayed thoughts/status lines
    pub thought_delay: Duration,

    /// Duration of the fade-in of a newly displayed thought
    pub thought_fade_in: Duration,

    /// Delay before auto-scroll is applied, lets layout settle
    pub scroll_settle: Duration,

    /// Give up connecting after this long
    pub connect_timeout: Duration,

    /// How long to wait for the closing handshake on quit
    pub close_grace: Duration,

    /// Lines to scroll per key press
    pub scroll_step: usize,

    /// Width of the admin panel in percent of the screen
    pub admin_panel_percent: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_rate_ms: 16,
            thought_delay: Duration::from_millis(100),
            thought_fade_in: Duration::from_millis(500),
            scroll_settle: Duration::from_millis(50),
            connect_timeout: Duration::from_secs(10),
            close_grace: Duration::from_millis(500),
            scroll_step: 3,
            admin_panel_percent: 40,
        }
    }
}

impl Config {
    pub fn from_args(args: &Args) -> Self {
        Self {
            thought_delay: Duration::from_millis(args.thought_delay_ms),
            ..Self::default()
        }
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }
}

/// Key bindings shown in the help bar
pub const KEY_HINTS: &[(&str, &str)] = &[
    ("Enter", "send"),
    ("Ctrl+R", "reset"),
    ("F3", "thinking"),
    ("F4", "raw results"),
    ("Tab", "admin"),
    ("Esc", "quit"),
];
