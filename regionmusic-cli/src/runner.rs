use std::io::{self, BufRead};
use std::sync::Arc;

use clap::ArgMatches;
use log::{info, warn};
use regionmusic_lib::audio::{AudioOutput, NullOutput};
use regionmusic_lib::{
    AppPaths, AudioError, Command, ManagerOptions, MusicManager, Notice, NoticeSink,
};

use crate::logging::LogRing;

fn open_output(no_audio: bool) -> Arc<dyn AudioOutput> {
    if no_audio {
        return Arc::new(NullOutput::new());
    }
    #[cfg(feature = "rodio-output")]
    {
        Arc::new(regionmusic_lib::audio::RodioOutput::new())
    }
    #[cfg(not(feature = "rodio-output"))]
    {
        warn!("built without audio output support; playing silently");
        Arc::new(NullOutput::new())
    }
}

fn notice_printer(to_stderr: bool) -> NoticeSink {
    Arc::new(move |notice: Notice| {
        if to_stderr {
            eprintln!("{}", notice);
        } else {
            println!("{}", notice);
        }
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AudioError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Commands answered with JSON instead of notices in `--json` mode.
fn run_json(manager: &MusicManager, command: &Command) -> Result<bool, AudioError> {
    match command {
        Command::List => print_json(&manager.list_music_files())?,
        Command::CacheStats => {
            manager.initialize();
            print_json(&manager.cache_stats())?
        }
        Command::CacheStatus => {
            manager.initialize();
            print_json(&manager.cache_status())?
        }
        Command::CacheInfo => {
            manager.initialize();
            print_json(&manager.cache_info())?
        }
        Command::GetVolume => print_json(&serde_json::json!({
            "volume": manager.current_volume(),
            "modVolume": manager.mod_volume(),
        }))?,
        Command::Config => print_json(&manager.settings())?,
        _ => return Ok(false),
    }
    Ok(true)
}

/// Run every command line. Returns how many failed.
fn run_lines<I>(manager: &MusicManager, lines: I, json: bool, log_ring: &LogRing) -> Result<usize, AudioError>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    let mut failures = 0;
    for line in lines {
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim().eq_ignore_ascii_case("LOG") {
            for entry in log_ring.lines() {
                println!("{}", entry);
            }
            continue;
        }

        info!("command received: {}", line);
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                eprintln!("[error] {}", err);
                failures += 1;
                continue;
            }
        };

        if json && run_json(manager, &command)? {
            continue;
        }
        if manager.handle(command).is_err() {
            failures += 1;
        }
    }
    Ok(failures)
}

pub fn run(args: &ArgMatches, log_ring: LogRing) -> Result<i32, AudioError> {
    let data_dir = args
        .get_one::<String>("data-dir")
        .map(String::as_str)
        .unwrap_or(".");
    let app_name = args
        .get_one::<String>("app-name")
        .map(String::as_str)
        .unwrap_or(crate::cli::args::DEFAULT_APP_NAME);
    let no_audio = args.get_flag("no-audio");
    let json = args.get_flag("json");

    let paths = AppPaths::new(data_dir, app_name);
    info!("starting rmusic in {}", paths.music_dir.display());

    let options = ManagerOptions {
        notices: Some(notice_printer(json)),
        ..ManagerOptions::default()
    };
    let manager = MusicManager::with_options(paths, open_output(no_audio), options);
    manager.initialize();

    let commands: Vec<String> = args
        .get_many::<String>("COMMANDS")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let failures = if commands.is_empty() {
        let stdin = io::stdin();
        let lines = stdin.lock().lines();
        run_lines(&manager, lines, json, &log_ring)?
    } else {
        run_lines(&manager, commands.into_iter().map(Ok), json, &log_ring)?
    };

    manager.shutdown();
    if failures > 0 {
        warn!("{} command(s) failed", failures);
        return Ok(1);
    }
    Ok(0)
}
