use crate::commands::{run_check, run_rubric, run_submit, CheckArgs, RubricArgs, SubmitArgs};
use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use stage_eval::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Stage Evaluation Submitter",
    about = "Submit internship evaluation wizards to the stage management backend",
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
    /// Submit one wizard form read from a JSON file
    Submit(SubmitArgs),
    /// Probe every backend collection endpoint
    Check(CheckArgs),
    /// Print the label-to-value table for a rubric dimension
    Rubric(RubricArgs),
    /// Run sample submissions against an in-memory backend
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Serve against an in-memory backend instead of BACKEND_BASE_URL
    #[arg(long)]
    pub(crate) in_memory: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Submit(args) => run_submit(args).await,
        Command::Check(args) => run_check(args).await,
        Command::Rubric(args) => run_rubric(args),
        Command::Demo(args) => run_demo(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stage_eval::workflows::internship::{RubricDimension, RubricTable};

    #[test]
    fn defaults_to_serve_without_subcommand() {
        let cli = Cli::try_parse_from(["stage-eval-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn rubric_command_parses_table_and_dimension() {
        let cli = Cli::try_parse_from(["stage-eval-api", "rubric", "--table", "score-sheet", "openness"])
            .expect("parses");
        match cli.command {
            Some(Command::Rubric(args)) => {
                assert_eq!(args.table, RubricTable::ScoreSheet);
                assert_eq!(args.dimension, RubricDimension::Openness);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn submit_requires_a_form_path() {
        assert!(Cli::try_parse_from(["stage-eval-api", "submit"]).is_err());
        let cli = Cli::try_parse_from([
            "stage-eval-api",
            "submit",
            "--form",
            "wizard.json",
            "--today",
            "2024-03-15",
        ])
        .expect("parses");
        assert!(matches!(cli.command, Some(Command::Submit(_))));
    }
}
