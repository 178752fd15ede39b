use anyhow::Result;
use netgauge::{SpeedTest, TestConfig, TestStatus};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let mut test = SpeedTest::new(TestConfig::default())?;
    let mut updates = test.subscribe();
    test.start().await;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let session = updates.borrow_and_update().clone();
                print_session(&session);
                if session.status.is_terminal() {
                    println!("{}", session.format_result());
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                test.cancel();
            }
        }
    }

    Ok(())
}

fn print_session(session: &netgauge::TestSession) {
    let tag = match session.status {
        TestStatus::Idle => "idle",
        TestStatus::ProbingEndpoint => "probe",
        TestStatus::Downloading => "down",
        TestStatus::Uploading => "up",
        TestStatus::Completed => "done",
        TestStatus::Cancelled => "cancelled",
        TestStatus::Failed => "failed",
    };

    let live = match session.status {
        TestStatus::Downloading => session.download_mbps.zip(session.download_progress),
        TestStatus::Uploading => session.upload_mbps.zip(session.upload_progress),
        _ => None,
    };

    match live {
        Some((speed, percent)) => println!("[{tag}] {speed} Mbps ({percent}%)"),
        None => println!("[{tag}] {}", session.status_message),
    }
}
