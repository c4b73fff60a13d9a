use std::time::Duration;

use clap::Subcommand;
use voteclock_core::store::RecordingAuth;
use voteclock_core::{
    Config, Event, ManualClock, SessionGuard, SessionGuardHandle, SessionState, TokioClock,
};

use super::{print_json, runtime};

/// Hard stop for simulations that never expire.
const MAX_SIMULATED_SECS: u64 = 24 * 60 * 60;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Replay a session on a simulated clock, one tick per second
    Simulate {
        /// Session length (defaults to config)
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Prompt window before expiry (defaults to config)
        #[arg(long)]
        prompt_secs: Option<u64>,
        /// Extend the session at these elapsed seconds
        #[arg(long = "extend-at")]
        extend_at: Vec<u64>,
        /// Log out at this elapsed second
        #[arg(long)]
        logout_at: Option<u64>,
    },
    /// Run a session in real time, extending automatically on the first prompts
    Run {
        #[arg(long)]
        duration_secs: Option<u64>,
        #[arg(long)]
        prompt_secs: Option<u64>,
        /// How many prompts to answer with an extension before letting it expire
        #[arg(long, default_value = "0")]
        auto_extend: u32,
    },
}

fn session_config(
    duration_secs: Option<u64>,
    prompt_secs: Option<u64>,
) -> voteclock_core::SessionConfig {
    let mut config = Config::load_or_default().session_config();
    if let Some(secs) = duration_secs {
        config.duration = Duration::from_secs(secs);
    }
    if let Some(secs) = prompt_secs {
        config.prompt_window = Duration::from_secs(secs);
    }
    config
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SessionAction::Simulate {
            duration_secs,
            prompt_secs,
            extend_at,
            logout_at,
        } => {
            let config = session_config(duration_secs, prompt_secs).with_tick(Duration::from_secs(1));
            let clock = ManualClock::starting_now();
            let auth = RecordingAuth::new();
            let mut guard = SessionGuard::start(clock.clone(), config, auth.clone())?;
            print_json(&guard.started_event())?;

            let mut second = 0;
            while guard.state() != SessionState::Expired && second < MAX_SIMULATED_SECS {
                clock.advance_ms(1_000);
                second += 1;
                if extend_at.contains(&second) {
                    if let Some(event) = guard.extend()? {
                        print_json(&event)?;
                    }
                }
                if logout_at == Some(second) {
                    if let Some(event) = guard.expire()? {
                        print_json(&event)?;
                    }
                }
                if let Some(event) = guard.tick()? {
                    print_json(&event)?;
                }
            }
            eprintln!("sign-out calls: {}", auth.calls());
        }
        SessionAction::Run {
            duration_secs,
            prompt_secs,
            auto_extend,
        } => {
            let config = session_config(duration_secs, prompt_secs);
            runtime()?.block_on(async move {
                let auth = RecordingAuth::new();
                let guard = SessionGuard::start(TokioClock::new(), config, auth)?;
                print_json(&guard.started_event())?;
                let (handle, mut rx) = SessionGuardHandle::spawn(guard);

                let mut extensions_left = auto_extend;
                while let Some(event) = rx.recv().await {
                    print_json(&event)?;
                    if matches!(event, Event::SessionPrompted { .. }) && extensions_left > 0 {
                        extensions_left -= 1;
                        if let Some(extended) = handle.extend()? {
                            print_json(&extended)?;
                        }
                    }
                }
                Ok::<(), Box<dyn std::error::Error>>(())
            })?;
        }
    }
    Ok(())
}
