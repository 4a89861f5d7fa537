use console::Style;
use flume::Receiver;
use indicatif::ProgressBar;

use crate::plan::Outcome;
use crate::runner::RowEvent;
use crate::runner::RunnerMessage;

pub struct OutPutter;

impl OutPutter {
    /// Consumes the run's event stream to the end. Dropping the receiver
    /// early would cancel the run, so this drains until the channel closes.
    pub async fn start(rx: Receiver<RunnerMessage>, plan_path: &str, n_rows: usize, json: bool) {
        if json {
            Self::stream_json(rx).await
        } else {
            Self::stream_pretty(rx, plan_path, n_rows).await
        }
    }

    /// One JSON object per line, suitable for piping into an SSE bridge or
    /// any other machine consumer.
    async fn stream_json(rx: Receiver<RunnerMessage>) {
        while let Ok(message) = rx.recv_async().await {
            match message {
                RunnerMessage::Row(event) => {
                    if let Ok(line) = serde_json::to_string(&event) {
                        println!("{line}");
                    }
                }
                RunnerMessage::AuthFailed { reason } => {
                    let line = serde_json::json!({
                        "error": "authentication failed",
                        "reason": reason,
                    });
                    println!("{line}");
                }
            }
        }
    }

    async fn stream_pretty(rx: Receiver<RunnerMessage>, plan_path: &str, n_rows: usize) {
        let style = Style::new().bold().cyan();
        let open_text =
            &format!("Running test plan: {plan_path} Found {n_rows} eligible rows: Running...");
        println!("{}", style.apply_to(open_text));

        let bar = ProgressBar::new(n_rows as u64);
        let mut i = 1;
        let mut failed_rows: Vec<RowEvent> = vec![];

        while let Ok(message) = rx.recv_async().await {
            match message {
                RunnerMessage::Row(event) => {
                    match event.outcome {
                        Outcome::Pass => bar.println(format!(
                            "[{i}/{n_rows}] {}  {} {} {}: got status {} {}",
                            console::style("✔").green().bold(),
                            event.method,
                            event.endpoint,
                            event.test_case,
                            event.actual_status,
                            console::style("PASS!").green().bold(),
                        )),
                        Outcome::Fail => {
                            bar.println(format!(
                                "[{i}/{n_rows}] {}  {} {} {}: expected {} got {} {}",
                                console::style("╳").red().bold(),
                                event.method,
                                event.endpoint,
                                event.test_case,
                                event.expected_status,
                                event.actual_status,
                                console::style("FAILED!").red().bold(),
                            ));
                            failed_rows.push(event);
                        }
                    }

                    bar.set_position(i as u64);
                    i += 1;
                }
                RunnerMessage::AuthFailed { reason } => {
                    bar.abandon();
                    println!(
                        "{}  {}",
                        console::style("╳").red().bold(),
                        console::style(format!(
                            "Login failed: {reason}. No rows were executed."
                        ))
                        .red()
                        .bold(),
                    );
                    return;
                }
            }
        }
        bar.finish_and_clear();

        if !failed_rows.is_empty() {
            println!();
            println!("{}", console::style("Summary of failed rows:").bold().red());
            for (idx, event) in failed_rows.iter().enumerate() {
                println!(
                    "\n{}. {} {} {}",
                    idx + 1,
                    event.method,
                    event.endpoint,
                    event.test_case
                );
                println!(
                    "  {}",
                    console::style(format!("Expected status {}", event.expected_status)).green()
                );
                println!(
                    "  {}",
                    console::style(format!("Got status {}", event.actual_status)).red()
                );
                if !event.response_body.is_empty() {
                    println!("  {}", console::style(&event.response_body).dim());
                }
            }
        } else if n_rows > 0 {
            println!();
            println!("{}", console::style("All rows passed! 🎉").bold().green());
        } else {
            println!();
            println!(
                "{}",
                console::style("Every row is already marked PASS, nothing to do.").bold()
            );
        }
    }
}
