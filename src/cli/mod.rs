use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::Config;

pub mod delete;
pub mod identify;
pub mod serve;
pub mod show;

pub use delete::run_delete;
pub use identify::run_identify;
pub use serve::run_serve;
pub use show::run_show;

#[derive(Parser)]
#[command(name = "contactlink")]
#[command(about = "Identity reconciliation for email and phone submissions")]
#[command(version)]
pub struct Cli {
    /// SQLite database file (overrides CONTACTLINK_DB)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Store unseen email/phone values as new secondary contacts
    #[arg(long, global = true)]
    pub link_new_info: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Command-line flags win over environment values.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref db) = self.db {
            config.db_path = db.clone();
        }
        if self.link_new_info {
            config.link_new_info = true;
        }
        if let Commands::Serve(ServeArgs { bind: Some(bind) }) = &self.command {
            config.bind = *bind;
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP identify service
    Serve(ServeArgs),
    /// Reconcile one email/phone pair and print the response
    Identify(IdentifyArgs),
    /// Show the cluster a contact belongs to
    Show(ShowArgs),
    /// Soft-delete a contact
    Delete(DeleteArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on (overrides CONTACTLINK_BIND and PORT)
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct IdentifyArgs {
    #[arg(short, long)]
    pub email: Option<String>,
    #[arg(short, long)]
    pub phone: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Contact id
    pub id: i64,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Contact id
    pub id: i64,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}
