use anyhow::Result;
use std::net::SocketAddr;

use crate::db::Database;
use crate::identity::Reconciler;
use crate::server;

/// Execute the serve command (blocks until Ctrl+C)
pub fn run_serve(db: Database, reconciler: Reconciler, bind: SocketAddr) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    println!("Starting identity service on {}...", bind);
    println!("Press Ctrl+C to stop");

    runtime.block_on(server::serve(db, reconciler, bind))?;
    println!("Identity service stopped");
    Ok(())
}
