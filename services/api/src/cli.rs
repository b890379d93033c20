use crate::demo::{run_demo, run_payout_report, DemoArgs, PayoutReportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use profit_share::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Profit Share",
    about = "Reconcile profit-sharing payouts and manage award lifecycles from the command line",
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
    /// Reconcile payouts for a stakeholder or user from seed data
    Payouts {
        #[command(subcommand)]
        command: PayoutsCommand,
    },
    /// Run an end-to-end CLI demo covering payout KPIs and the award lifecycle
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum PayoutsCommand {
    /// Print dashboard KPIs and payout history
    Report(PayoutReportArgs),
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
        Command::Payouts {
            command: PayoutsCommand::Report(args),
        } => run_payout_report(args),
        Command::Demo(args) => run_demo(args),
    }
}
