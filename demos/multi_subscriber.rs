//! Several observers on one job
//!
//! Starts a job and attaches three observers: two follow the whole stream,
//! one detaches after the first progress event. Every observer that stays
//! attached sees the same events and exactly one terminal event.
//!
//! Usage: `cargo run --example multi_subscriber -- <url> [audio|video]`

use media_dl::{Config, JobEvent, MediaDownloader, Subscription, TargetKind};
use tracing_subscriber::EnvFilter;

async fn follow(name: &'static str, mut events: Subscription, detach_early: bool) {
    while let Some(event) = events.recv().await {
        match &event {
            JobEvent::Progress(p) => match (&p.speed_value, &p.speed_unit) {
                (Some(speed), Some(unit)) => {
                    println!("[{name}] {:5.1}% at {speed}{unit}", p.percentage)
                }
                _ => println!("[{name}] {:5.1}%", p.percentage),
            },
            JobEvent::Retrying { failed, next, exit_code } => {
                println!("[{name}] {failed} failed ({exit_code:?}), trying {next}");
            }
            JobEvent::Terminal(t) => {
                println!(
                    "[{name}] finished: {:?} (exit {:?}, cancelled: {}, context: {:?})",
                    t.outcome,
                    t.exit_code,
                    t.cancelled,
                    t.context.as_ref().map(ToString::to_string)
                );
            }
        }

        if detach_early && matches!(event, JobEvent::Progress(_)) {
            println!("[{name}] detaching");
            events.unsubscribe();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("media_dl=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string());
    let kind = TargetKind::from_format(args.next().as_deref());

    let downloader = MediaDownloader::new(Config::default()).await?;
    let id = downloader.start_job(kind, &url).await?;
    println!("job {id} started ({kind})");

    let a = downloader.attach_observer(id).await?;
    let b = downloader.attach_observer(id).await?;
    let c = downloader.attach_observer(id).await?;

    tokio::join!(
        follow("a", a, false),
        follow("b", b, false),
        follow("c", c, true),
    );

    let job = downloader.get_job(id).await?;
    println!(
        "final status: {} after {} attempt(s), cache now holds {:?}",
        job.status,
        job.attempts,
        downloader.credentials().get().await.map(|c| c.to_string())
    );

    downloader.shutdown().await?;
    Ok(())
}
