use std::time::Duration;

use reqwest::Client;
use volley::{Reporter, Runner, Scenario, Stage, StdoutReporter};

#[tokio::main]
async fn main() -> volley::Result<()> {
    volley::logging::init();
    // Never build clients inside the action; clone the shared one instead.
    let client = Client::new();

    let scenario = Scenario::builder()
        .name("Http scenario")
        .args(client)
        .action(|client: Client| async move {
            // Yeah lets hardcode it
            let res = client.get("http://localhost:3000").send().await?;
            res.error_for_status().map(|r| r.status().as_u16())
        })
        .build();

    let runner = Runner::default();

    let summary = runner.distribute("10s", 100, &scenario, Some(10)).await?;
    StdoutReporter.report(&summary).await?;

    let summaries = runner
        .progressive(
            vec![
                Stage::new(10, "3s"),
                Stage::new(100, "3s"),
                Stage::new(10, "3s"),
            ],
            &scenario,
            None,
            Duration::from_secs(1),
        )
        .await?;
    for summary in &summaries {
        StdoutReporter.report(summary).await?;
    }
    Ok(())
}
