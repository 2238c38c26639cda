mod alarm;
mod alert;
mod api;
mod runtime;
mod shutdown;
mod time_provider;
mod timer;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;

use crate::alarm::clock_time::ClockTime;
use crate::alarm::controller::AlarmController;
use crate::alarm::model::{AlarmSettings, ShiftBook, load_shift_config};
use crate::alarm::selection::SelectionRequest;
use crate::alert::{AlertSound, CommandPlayer, LogVibrator, TerminalBell};
use crate::api::{ApiServer, ApiServerConfig, ApiSharedState};
use crate::runtime::ExitPolicy;
use crate::time_provider::SystemClock;

#[derive(Parser, Debug)]
#[command(
    name = "shiftalarm",
    version,
    about = "Wake alarm with a manual time or a rotating shift schedule"
)]
struct Cli {
    /// JSON file with shift definitions; the built-in shifts are used otherwise.
    #[arg(long)]
    shifts: Option<PathBuf>,

    /// Manual alarm time, e.g. "07:30 AM".
    #[arg(long, conflicts_with = "shift")]
    at: Option<String>,

    /// Name of the shift to follow.
    #[arg(long)]
    shift: Option<String>,

    #[arg(long)]
    vibrate: bool,

    /// External program that plays the alert sound.
    #[arg(long)]
    player: Option<String>,

    #[arg(long = "player-arg", requires = "player", allow_hyphen_values = true)]
    player_args: Vec<String>,

    /// Resolve and print the armed instant, then exit.
    #[arg(long)]
    dry_run: bool,

    /// Sound one alert session right away.
    #[arg(long)]
    test_alert: bool,

    #[arg(long)]
    list_shifts: bool,

    /// Serve the alarm state over HTTP.
    #[arg(long)]
    api: bool,

    #[arg(long, default_value = "127.0.0.1")]
    api_bind: String,

    #[arg(long, default_value_t = 8099)]
    api_port: u16,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let (settings, shifts) = match &cli.shifts {
        Some(path) => {
            let config = load_shift_config(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            info!(
                "loaded {} (shift file version {})",
                path.display(),
                config.version
            );
            (config.settings, config.shifts)
        }
        None => (AlarmSettings::default(), ShiftBook::builtin()),
    };

    if cli.list_shifts {
        for shift in shifts.iter() {
            let times = shift
                .times()
                .iter()
                .map(ClockTime::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            println!("{}: {times}", shift.name());
        }
        return Ok(());
    }

    let request = match (&cli.at, &cli.shift) {
        (Some(text), _) => Some(SelectionRequest::Manual(
            text.parse::<ClockTime>()
                .with_context(|| format!("invalid --at value '{text}'"))?,
        )),
        (None, Some(name)) => Some(SelectionRequest::Shift(name.clone())),
        (None, None) => None,
    };
    if request.is_none() && !cli.test_alert {
        bail!("choose an alarm with --at \"HH:MM AM\" or --shift NAME");
    }
    let follows_shift = matches!(request, Some(SelectionRequest::Shift(_)));

    let sound: Box<dyn AlertSound> = match &cli.player {
        Some(program) => Box::new(CommandPlayer::new(program.clone(), cli.player_args.clone())),
        None => Box::new(TerminalBell),
    };
    let vibration_enabled = cli.vibrate || settings.vibration_enabled;
    let mut controller = AlarmController::new(
        SystemClock,
        shifts,
        sound,
        Box::new(LogVibrator),
        vibration_enabled,
    );
    let events = controller.subscribe();

    if let Some(request) = request {
        controller.set_selection(request)?;
        let target = controller.arm_from_selection();
        if cli.dry_run {
            println!(
                "Alarm armed for {} ({})",
                target.format("%Y-%m-%d %I:%M %p"),
                controller.selection().label()
            );
            controller.dispose();
            return Ok(());
        }
    } else if cli.dry_run {
        bail!("--dry-run needs --at or --shift");
    }

    if cli.test_alert {
        controller.test_alert();
    }

    let api_server = if cli.api {
        let server = ApiServer::start(ApiServerConfig {
            bind_addr: cli.api_bind.clone(),
            port: cli.api_port,
        })
        .with_context(|| {
            format!(
                "failed to start local API at {}:{}",
                cli.api_bind, cli.api_port
            )
        })?;
        Some(server)
    } else {
        None
    };
    let api_state: Option<Arc<Mutex<ApiSharedState>>> =
        api_server.as_ref().map(|server| Arc::clone(&server.state));

    let exit = if follows_shift {
        ExitPolicy::Never
    } else {
        ExitPolicy::WhenIdle
    };
    let shutdown = shutdown::watch_for_shutdown()?;
    let result = runtime::run(
        &mut controller,
        &events,
        api_state.as_ref(),
        exit,
        &shutdown,
    );

    controller.dispose();
    drop(api_server);
    info!("shutdown complete");
    result
}
