use clap::Args;
use voteclock_core::{spawn_watch, Config, Deadline, DeadlineWatcher, SystemClock};

use super::{print_json, runtime};

#[derive(Args)]
pub struct CountdownArgs {
    /// Deadline (RFC 3339 timestamp or YYYY-MM-DD)
    deadline: String,
    /// Keep ticking instead of printing one sample
    #[arg(long)]
    watch: bool,
    /// Stop after this many samples when watching
    #[arg(long, default_value = "10")]
    ticks: usize,
}

pub fn run(args: CountdownArgs) -> Result<(), Box<dyn std::error::Error>> {
    let deadline = Deadline::parse(&args.deadline)?;
    let tick = Config::load_or_default().tick_interval();

    if !args.watch {
        let mut watcher = DeadlineWatcher::new(deadline, tick, SystemClock)?;
        if let Some(sample) = watcher.sample() {
            print_json(&sample)?;
        }
        return Ok(());
    }

    runtime()?.block_on(async move {
        let (handle, mut rx) = spawn_watch(deadline, tick, SystemClock)?;
        let mut printed = 0;
        while let Some(sample) = rx.recv().await {
            print_json(&sample)?;
            printed += 1;
            if printed >= args.ticks {
                break;
            }
        }
        handle.cancel();
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
