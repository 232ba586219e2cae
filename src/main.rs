use clap::Parser;
use contactlink::cli::{run_delete, run_identify, run_serve, run_show, Cli, Commands};
use contactlink::config::Config;
use contactlink::db::Database;
use contactlink::identity::Reconciler;
use contactlink::logging::init_logging;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    cli.apply(&mut config);
    init_logging(&config.log_filter, config.log_json)?;

    let db = Database::open(&config.db_path)?;
    let reconciler = Reconciler::new(config.max_attempts, config.link_new_info);

    match cli.command {
        Commands::Serve(_) => {
            run_serve(db, reconciler, config.bind)?;
        }
        Commands::Identify(args) => {
            run_identify(&db, &reconciler, args.email, args.phone)?;
            db.close()?;
        }
        Commands::Show(args) => {
            run_show(&db, &reconciler, args.id)?;
            db.close()?;
        }
        Commands::Delete(args) => {
            run_delete(&db, args.id, args.force)?;
            db.close()?;
        }
    }

    Ok(())
}
