#![allow(clippy::result_large_err)]

use std::time::Duration;

use clap::Parser;
use miette::Diagnostic;
use miette::Result;
use thiserror::Error;

use crate::auth::HttpAuthenticator;
use crate::cli::Cli;
use crate::invoker::HttpInvoker;
use crate::outputter::OutPutter;
use crate::parser::PlanFile;
use crate::plan::PlanError;
use crate::plan::TestPlan;
use crate::runner::Runner;
use crate::runner::RunnerMessage;

mod auth;
mod cli;
mod invoker;
mod outputter;
mod parser;
mod plan;
mod repair;
mod runner;

#[derive(Error, Debug, Diagnostic)]
pub enum PlanproofError {
    #[error("Failed to read plan file")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse plan file")]
    TomlParsing(#[from] toml::de::Error),

    #[error("Failed to write plan file")]
    TomlWriting(#[from] toml::ser::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    PlanError(#[from] PlanError),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let contents = std::fs::read_to_string(&cli.plan).map_err(PlanproofError::FileError)?;
    let plan_file: PlanFile = toml::from_str(&contents).map_err(PlanproofError::TomlParsing)?;

    let mut plan =
        TestPlan::from_raw(&plan_file, &contents, &cli.plan).map_err(PlanproofError::PlanError)?;
    let n_rows = plan.eligible_count();

    let (tx, rx) = flume::unbounded::<RunnerMessage>();

    // Outputter Task
    let outputter_path = cli.plan.clone();
    let json = cli.json;
    let outputter_jh = tokio::spawn(async move {
        OutPutter::start(rx, &outputter_path, n_rows, json).await;
    });

    // Runner Task: authenticates once, then walks the plan row by row and
    // streams one event per executed row to the outputter.
    let runner = Runner::new(
        HttpAuthenticator::from_env(),
        HttpInvoker::new(),
        Duration::from_millis(cli.delay_ms),
    );
    let runner_jh = tokio::spawn(async move {
        let summary = runner.run(&mut plan, &tx).await;
        drop(tx);
        (plan, summary)
    });

    let (runner_res, _) = futures::join!(runner_jh, outputter_jh);
    let (plan, _summary) = runner_res.map_err(|_| miette::miette!("runner task panicked"))?;

    // Write columns 8-10 back so the next invocation resumes where this one
    // left off: PASS rows are skipped, FAIL and untouched rows run again.
    let mut plan_file = plan_file;
    plan.write_back(&mut plan_file);
    let rendered = toml::to_string_pretty(&plan_file).map_err(PlanproofError::TomlWriting)?;
    std::fs::write(&cli.plan, rendered).map_err(PlanproofError::FileError)?;

    Ok(())
}
