use std::io::Write;
use std::sync::Arc;

use tabledump_engine::Dumper;
use tabledump_source_sqlite::SqliteSource;

use crate::config::{DumpArgs, Output};
use crate::error::CliError;

pub async fn run(args: DumpArgs) -> Result<(), CliError> {
    let plan = args.resolve()?;
    tracing::info!(
        database = %plan.source.path.display(),
        max_allowed_packet = plan.dump.max_allowed_packet,
        ignored = plan.dump.ignore_tables.len(),
        "starting dump"
    );

    let source = SqliteSource::open(&plan.source)?;
    let dumper = Dumper::new(Arc::new(source), plan.dump)?;

    match plan.output {
        Output::Stdout => {
            let dump = dumper.dump().await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&dump.data)?;
            stdout.flush()?;
        }
        Output::File { dir, name } => {
            let (path, summary) = dumper.dump_to_file(&dir, &name).await?;
            tracing::info!(
                path = %path.display(),
                tables = summary.tables.len(),
                rows = summary.rows(),
                "dump written"
            );
        }
    }
    Ok(())
}
