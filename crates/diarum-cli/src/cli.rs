use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "diarum")]
#[command(about = "Write today's diary from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the diary for a date (default: today)
    Show {
        /// YYYY-MM-DD, `today` or `yesterday`
        date: Option<String>,
    },
    /// Replace the diary for a date and save it
    Write {
        /// YYYY-MM-DD, `today` or `yesterday`
        #[arg(short, long)]
        date: Option<String>,
        /// Diary text; read from stdin or $EDITOR when omitted
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Configure the backend endpoint and sync timing
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Sign in to the diary backend
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Manage Chevereto image hosting
    Image {
        #[command(subcommand)]
        command: ImageCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Backend base URL
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
        /// Quiet period before edits are saved
        #[arg(long, value_name = "MS")]
        debounce_ms: Option<u64>,
        /// How long the saved status stays visible
        #[arg(long, value_name = "MS")]
        saved_display_ms: Option<u64>,
    },
    /// Print the effective configuration
    Show,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with username or email and store the session in the keychain
    Login {
        /// Username or email
        #[arg(long, value_name = "NAME")]
        identity: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(long, value_name = "NAME")]
        username: String,
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        #[arg(long, value_name = "PASSWORD")]
        password_confirm: String,
    },
    /// Show who is signed in
    Status,
    /// Forget the stored session
    Logout,
}

#[derive(Subcommand)]
pub enum ImageCommands {
    /// Print the stored image hosting settings
    Settings,
    /// Update image hosting settings
    Configure {
        /// Chevereto instance URL
        #[arg(long, value_name = "URL")]
        domain: Option<String>,
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
        #[arg(long, value_name = "ID")]
        album_id: Option<String>,
        /// Turn image hosting off, keeping the stored values
        #[arg(long)]
        disable: bool,
    },
    /// Check that a Chevereto instance accepts the key
    Test {
        #[arg(long, value_name = "URL")]
        domain: String,
        #[arg(long, value_name = "KEY")]
        api_key: String,
    },
    /// Upload an image and print its URL
    Upload {
        path: PathBuf,
    },
}
