use std::time::Duration;

use flume::Sender;
use serde::Serialize;

use crate::auth::Authenticate;
use crate::invoker::Invoke;
use crate::invoker::InvokeOutcome;
use crate::plan::ActualStatus;
use crate::plan::Method;
use crate::plan::Outcome;
use crate::plan::PayloadKind;
use crate::plan::TestPlan;

/// One ordered progress event per executed row. Field names serialize in
/// camelCase so the JSON stream is directly consumable by a web frontend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowEvent {
    pub index: usize,
    pub method: Method,
    pub endpoint: String,
    pub test_case: String,
    pub payload: String,
    pub payload_kind: PayloadKind,
    pub expected_status: u16,
    pub expected_response_hint: String,
    pub actual_status: u16,
    pub outcome: Outcome,
    pub response_body: String,
    pub progress: u8,
}

#[derive(Debug, Clone)]
pub enum RunnerMessage {
    Row(RowEvent),
    /// Terminal sentinel: the run ended before any row executed. Not a
    /// progress event; at most one is ever sent, and nothing follows it.
    AuthFailed {
        reason: String,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub executed: usize,
    pub passed: usize,
    pub failed: usize,
    pub auth_failed: bool,
    pub cancelled: bool,
}

/// Drives one run over one plan: authenticate once, walk the rows in order
/// honoring the resume rule, write each outcome back into its row, and emit
/// one event per executed row.
pub struct Runner<A, I> {
    auth: A,
    invoker: I,
    delay: Duration,
}

impl<A: Authenticate, I: Invoke> Runner<A, I> {
    /// `delay` is the deliberate pause between rows that keeps the live
    /// stream readable instead of bursty.
    pub fn new(auth: A, invoker: I, delay: Duration) -> Self {
        Self {
            auth,
            invoker,
            delay,
        }
    }

    pub async fn run(&self, plan: &mut TestPlan, tx: &Sender<RunnerMessage>) -> RunSummary {
        // The denominator is fixed before authentication: every row that is
        // not already PASS and has an endpoint counts, wherever it sits.
        let total = plan.eligible_count();
        let mut summary = RunSummary {
            total,
            ..RunSummary::default()
        };

        let token = match self.auth.login().await {
            Ok(token) => token,
            Err(failure) => {
                if let Some(first) = plan.rows.first_mut() {
                    first.actual_status = Some(ActualStatus::LoginFailed);
                    first.actual_response =
                        Some("Unable to authenticate. Check credentials or Auth API.".into());
                    first.outcome = Some(Outcome::Fail);
                }

                summary.auth_failed = true;
                let _ = tx
                    .send_async(RunnerMessage::AuthFailed {
                        reason: failure.to_string(),
                    })
                    .await;
                return summary;
            }
        };

        for index in 0..plan.rows.len() {
            // The plan is a contiguous prefix: a blank endpoint ends the
            // run even if later rows are filled in.
            if plan.rows[index].is_blank() {
                break;
            }
            if plan.rows[index].outcome == Some(Outcome::Pass) {
                continue;
            }

            let InvokeOutcome { status, body } =
                self.invoker.invoke(&plan.rows[index], &token).await;

            let row = &mut plan.rows[index];
            row.actual_status = Some(ActualStatus::Code(status));
            row.actual_response = Some(body.clone());

            let verdict = if status == row.expected_status {
                Outcome::Pass
            } else {
                Outcome::Fail
            };
            row.outcome = Some(verdict);

            summary.executed += 1;
            match verdict {
                Outcome::Pass => summary.passed += 1,
                Outcome::Fail => summary.failed += 1,
            }

            // total >= executed always holds here, so the division is safe.
            let progress = ((summary.executed as f64 / total as f64) * 100.0).round() as u8;

            let event = RowEvent {
                index,
                method: row.method,
                endpoint: row.endpoint.clone(),
                test_case: row.test_case.clone(),
                payload: row.payload.clone(),
                payload_kind: row.payload_kind,
                expected_status: row.expected_status,
                expected_response_hint: row.expected_response.clone(),
                actual_status: status,
                outcome: verdict,
                response_body: body,
                progress,
            };

            // A dropped receiver is the cancellation signal: stop invoking,
            // keep everything already written, leave the rest for a re-run.
            if tx.send_async(RunnerMessage::Row(event)).await.is_err() {
                summary.cancelled = true;
                return summary;
            }

            tokio::time::sleep(self.delay).await;
        }

        summary
    }
}
