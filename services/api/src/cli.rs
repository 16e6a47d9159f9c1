use crate::server;
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use voter_registration::error::AppError;
use voter_registration::jurisdiction::JurisdictionDirectory;
use voter_registration::workflows::registration::{write_csv, PartnerDirectory, Registrant};

use crate::infra::StaticPartnerDirectory;

#[derive(Parser, Debug)]
#[command(
    name = "Voter Registration",
    about = "Run the voter registration intake service and its maintenance tasks",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Convert a JSON dump of registrants into the reporting CSV
    Export(ExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// JSON array of partner accounts; defaults to a single primary partner
    #[arg(long)]
    pub(crate) partners: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// JSON array of registrant records
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Destination CSV file; stdout when omitted
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// JSON array of partner accounts used for survey question wording
    #[arg(long)]
    pub(crate) partners: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Export(args) => run_export(args),
    }
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let reader = BufReader::new(File::open(&args.input)?);
    let registrants: Vec<Registrant> = serde_json::from_reader(reader)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    let partners = StaticPartnerDirectory::load(args.partners.as_deref())?;

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    let written = export_registrants(writer, &registrants, &partners)?;

    info!(rows = written, input = %args.input.display(), "registrant export written");
    Ok(())
}

fn export_registrants<W: Write>(
    writer: W,
    registrants: &[Registrant],
    partners: &StaticPartnerDirectory,
) -> Result<usize, AppError> {
    let directory = JurisdictionDirectory::standard();
    let resolved: Vec<_> = registrants
        .iter()
        .map(|registrant| {
            let partner = registrant.partner_id.and_then(|id| partners.fetch(id));
            (registrant, partner)
        })
        .collect();
    let rows = resolved
        .iter()
        .map(|(registrant, partner)| (*registrant, partner.as_ref()));
    Ok(write_csv(writer, rows, &directory)?)
}
