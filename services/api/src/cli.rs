use crate::demo::{run_demo, run_school_report, DemoArgs, SchoolReportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use health_dss::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "School Health Decision Support",
    about = "Run the school health decision-support service and reports from the command line",
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
    /// Generate a population health report from an exam-record export
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },
    /// Run an end-to-end CLI demo covering assessment and reporting
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum ReportCommand {
    /// Aggregate one school's examination records
    School(SchoolReportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Report {
            command: ReportCommand::School(args),
        } => run_school_report(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
