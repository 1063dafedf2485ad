use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use regionmusic_lib::audio::{AudioOutput, AudioStream, PlaybackLine};
use regionmusic_lib::cache::CacheLimits;
use regionmusic_lib::{
    AppPaths, AudioError, Command, ManagerOptions, MusicManager, Notice, NoticeLevel,
    PlaybackPhase,
};

#[derive(Debug, Default)]
struct LineState {
    gain: f32,
    open: bool,
    running: bool,
    looping: bool,
}

struct RecordingLine {
    state: Arc<Mutex<LineState>>,
}

impl PlaybackLine for RecordingLine {
    fn supports_gain(&self) -> bool {
        true
    }

    fn set_gain(&mut self, gain: f32) {
        self.state.lock().unwrap().gain = gain;
    }

    fn gain(&self) -> f32 {
        self.state.lock().unwrap().gain
    }

    fn start(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.running = state.open;
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    fn is_running(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.open && state.running
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.open = false;
        state.running = false;
    }
}

/// Output whose lines stay inspectable after they are handed out.
#[derive(Default)]
struct RecordingOutput {
    lines: Mutex<Vec<Arc<Mutex<LineState>>>>,
    unavailable: AtomicBool,
}

impl RecordingOutput {
    fn line(&self, index: usize) -> Arc<Mutex<LineState>> {
        self.lines.lock().unwrap()[index].clone()
    }

    fn opened(&self) -> usize {
        self.lines.lock().unwrap().len()
    }
}

impl AudioOutput for RecordingOutput {
    fn open_line(
        &self,
        stream: AudioStream,
        looping: bool,
    ) -> Result<Box<dyn PlaybackLine>, AudioError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AudioError::LineUnavailable("no free lines".into()));
        }
        assert!(stream.format().is_playable());
        let state = Arc::new(Mutex::new(LineState {
            gain: 1.0,
            open: true,
            running: false,
            looping,
        }));
        self.lines.lock().unwrap().push(state.clone());
        Ok(Box::new(RecordingLine { state }))
    }

    fn probe(&self) -> Result<(), AudioError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct Harness {
    dir: tempfile::TempDir,
    output: Arc<RecordingOutput>,
    notices: Arc<Mutex<Vec<Notice>>>,
    manager: MusicManager,
}

impl Harness {
    fn new() -> Self {
        Self::with_limits(CacheLimits::default())
    }

    fn with_limits(limits: CacheLimits) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let output = Arc::new(RecordingOutput::default());
        let notices = Arc::new(Mutex::new(Vec::new()));
        let manager = build_manager(dir.path(), output.clone(), notices.clone(), limits);
        Self {
            dir,
            output,
            notices,
            manager,
        }
    }

    fn paths(&self) -> AppPaths {
        AppPaths::new(self.dir.path(), "regionmusic")
    }

    fn add_wav(&self, name: &str) {
        let music = self.paths().music_dir;
        fs::create_dir_all(&music).unwrap();
        write_wav(&music.join(name));
    }

    fn notices_at(&self, level: NoticeLevel) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|notice| notice.level == level)
            .map(|notice| notice.text.clone())
            .collect()
    }
}

fn build_manager(
    data_dir: &Path,
    output: Arc<RecordingOutput>,
    notices: Arc<Mutex<Vec<Notice>>>,
    limits: CacheLimits,
) -> MusicManager {
    let options = ManagerOptions {
        limits,
        notices: Some(Arc::new(move |notice: Notice| notices.lock().unwrap().push(notice))),
        ..ManagerOptions::default()
    };
    MusicManager::with_options(AppPaths::new(data_dir, "regionmusic"), output, options)
}

fn write_wav(path: &Path) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 22_050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for frame in 0..2_205i32 {
        let sample = ((frame % 200) * 100 - 10_000) as i16;
        writer.write_sample(sample).unwrap();
        writer.write_sample(-sample).unwrap();
    }
    writer.finalize().unwrap();
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn plain_play_starts_at_mod_volume() {
    let h = Harness::new();
    h.add_wav("tavern.wav");

    h.manager.play("tavern.wav", true, false).unwrap();

    assert_eq!(h.manager.phase(), PlaybackPhase::Playing);
    assert_eq!(h.manager.now_playing().as_deref(), Some("tavern.wav"));
    let line = h.output.line(0);
    let line = line.lock().unwrap();
    assert!(line.running && line.looping);
    assert!((line.gain - 0.85).abs() < 1e-6);
    assert!(h.notices_at(NoticeLevel::Success)[0].starts_with("Playing: tavern.wav (WAV) in "));
}

#[test]
fn fade_in_starts_low_and_ends_at_mod_volume() {
    let h = Harness::new();
    h.add_wav("forest.wav");
    h.manager.set_fade_duration(0.1);
    h.manager.set_fade_interval(10);

    h.manager.play("forest.wav", false, true).unwrap();
    let line = h.output.line(0);
    assert!(wait_for(|| (line.lock().unwrap().gain - 0.85).abs() < 1e-6));
    assert!(line.lock().unwrap().running);
}

#[test]
fn stop_with_fade_releases_line_after_ramp() {
    let h = Harness::new();
    h.add_wav("a.wav");
    h.manager.set_fade_duration(0.1);
    h.manager.set_fade_interval(10);

    h.manager.play("a.wav", true, false).unwrap();
    h.manager.stop(true);
    assert_eq!(h.manager.phase(), PlaybackPhase::Idle);
    assert_eq!(h.manager.fading_out().as_deref(), Some("a.wav"));

    let line = h.output.line(0);
    assert!(wait_for(|| !line.lock().unwrap().open));
    assert_eq!(line.lock().unwrap().gain, 0.0);
    assert!(wait_for(|| h.manager.fading_out().is_none()));
}

#[test]
fn stop_without_fade_closes_immediately() {
    let h = Harness::new();
    h.add_wav("a.wav");
    h.manager.play("a.wav", false, false).unwrap();
    h.manager.stop(false);

    assert!(!h.output.line(0).lock().unwrap().open);
    assert_eq!(h.manager.phase(), PlaybackPhase::Idle);
    assert!(h.manager.fading_out().is_none());

    h.manager.stop(true);
    assert_eq!(h.manager.phase(), PlaybackPhase::Idle);
}

#[test]
fn crossfade_hands_current_to_previous() {
    let h = Harness::new();
    h.add_wav("a.wav");
    h.add_wav("b.wav");
    h.manager.set_fade_duration(30.0);

    h.manager.play("a.wav", true, false).unwrap();
    h.manager.play("b.wav", true, true).unwrap();

    assert_eq!(h.manager.phase(), PlaybackPhase::Transitioning);
    assert_eq!(h.manager.now_playing().as_deref(), Some("b.wav"));
    assert_eq!(h.manager.fading_out().as_deref(), Some("a.wav"));
    assert!(h.output.line(0).lock().unwrap().open);
}

#[test]
fn new_play_cuts_running_fade_out() {
    let h = Harness::new();
    for name in ["a.wav", "b.wav", "c.wav"] {
        h.add_wav(name);
    }
    h.manager.set_fade_duration(30.0);

    h.manager.play("a.wav", true, false).unwrap();
    h.manager.play("b.wav", true, true).unwrap();
    h.manager.play("c.wav", true, true).unwrap();

    assert!(!h.output.line(0).lock().unwrap().open);
    assert!(h.output.line(1).lock().unwrap().open);
    assert_eq!(h.manager.now_playing().as_deref(), Some("c.wav"));
    assert_eq!(h.manager.fading_out().as_deref(), Some("b.wav"));
}

#[test]
fn missing_file_fails_and_stays_idle() {
    let h = Harness::new();
    let err = h.manager.play("ghost.wav", false, false).unwrap_err();

    assert!(matches!(err, AudioError::FileNotFound(_)));
    assert_eq!(h.manager.phase(), PlaybackPhase::Idle);
    assert_eq!(h.output.opened(), 0);
    assert_eq!(h.notices_at(NoticeLevel::Error).len(), 1);
}

#[test]
fn unsupported_extension_is_rejected_before_decoding() {
    let h = Harness::new();
    let music = h.paths().music_dir;
    fs::create_dir_all(&music).unwrap();
    fs::write(music.join("song.mp3"), b"ID3").unwrap();

    let err = h.manager.play("song.mp3", false, false).unwrap_err();
    assert!(matches!(err, AudioError::UnsupportedFormat(_)));
    assert_eq!(h.output.opened(), 0);
    assert_eq!(h.manager.cache_stats().misses, 0);
}

#[test]
fn empty_name_is_rejected() {
    let h = Harness::new();
    assert!(matches!(
        h.manager.play("  ", false, false),
        Err(AudioError::EmptyFileName)
    ));
}

#[test]
fn unavailable_line_releases_old_track_and_ends_idle() {
    let h = Harness::new();
    h.add_wav("a.wav");
    h.add_wav("b.wav");
    h.manager.play("a.wav", true, false).unwrap();

    h.output.unavailable.store(true, Ordering::SeqCst);
    let err = h.manager.play("b.wav", true, false).unwrap_err();

    assert!(matches!(err, AudioError::LineUnavailable(_)));
    assert!(!h.output.line(0).lock().unwrap().open);
    assert_eq!(h.manager.phase(), PlaybackPhase::Idle);
    assert!(h.manager.now_playing().is_none());
}

#[test]
fn replay_is_served_from_ram() {
    let h = Harness::new();
    h.add_wav("loop.wav");
    h.manager.play("loop.wav", true, false).unwrap();
    h.manager.play("loop.wav", true, false).unwrap();

    let stats = h.manager.cache_stats();
    assert_eq!((stats.misses, stats.ram_hits), (1, 1));
    assert_eq!(h.output.opened(), 2);
}

#[test]
fn shutdown_persists_disk_tier_for_next_session() {
    let limits = CacheLimits {
        ram_entries: 0,
        ..CacheLimits::default()
    };
    let h = Harness::with_limits(limits.clone());
    h.add_wav("cave.wav");
    h.manager.play("cave.wav", false, false).unwrap();
    h.manager.shutdown();

    assert!(!h.manager.is_initialized());
    assert!(!h.output.line(0).lock().unwrap().open);
    let index = h.paths().cache_dir.join("cache_index.json");
    assert!(fs::read_to_string(index).unwrap().contains("cave.wav"));

    let restarted = build_manager(
        h.dir.path(),
        h.output.clone(),
        Arc::new(Mutex::new(Vec::new())),
        limits,
    );
    restarted.play("cave.wav", false, false).unwrap();
    let stats = restarted.cache_stats();
    assert_eq!((stats.disk_hits, stats.misses), (1, 0));
}

#[test]
fn slider_zero_maps_to_floor_and_applies_to_line() {
    let h = Harness::new();
    h.add_wav("a.wav");
    h.manager.play("a.wav", true, false).unwrap();

    h.manager.set_volume(0.0);
    assert!((h.manager.mod_volume() - 0.3825).abs() < 1e-6);
    assert!(h.manager.current_volume().abs() < 1e-6);
    assert!((h.output.line(0).lock().unwrap().gain - 0.3825).abs() < 1e-6);

    let saved = fs::read_to_string(h.paths().config_file).unwrap();
    assert!(saved.contains("modVolume=0.382"));
}

#[test]
fn initialize_seeds_folders_and_reports_health() {
    let h = Harness::new();
    assert!(!h.manager.is_system_healthy());

    h.manager.initialize();
    let paths = h.paths();
    assert!(paths.music_dir.join("README.txt").exists());
    assert!(paths.cache_dir.join("README.txt").exists());
    assert!(paths.config_file.exists());
    assert!(h.manager.is_system_healthy());
}

#[test]
fn list_command_announces_decodable_files() {
    let h = Harness::new();
    h.add_wav("b.wav");
    h.add_wav("a.wav");
    fs::write(h.paths().music_dir.join("broken.ogg"), b"not audio").unwrap();
    fs::write(h.paths().music_dir.join("notes.txt"), b"skip").unwrap();

    let files = h.manager.list_music_files();
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["a.wav", "b.wav", "broken.ogg"]);
    assert!(files[0].decodable);
    assert!(!files[2].decodable);
    assert!(h.manager.can_decode("a.wav"));
    assert!(!h.manager.can_decode("notes.txt"));

    h.manager.handle(Command::List).unwrap();
    let info = h.notices_at(NoticeLevel::Info);
    assert!(info.iter().any(|text| text == "Music files (3):"));
    assert!(info.iter().any(|text| text.contains("broken.ogg") && text.ends_with("[unreadable]")));
}

#[test]
fn resume_refuses_while_playing() {
    let h = Harness::new();
    h.add_wav("a.wav");
    h.manager.play("a.wav", true, false).unwrap();

    h.manager.resume("a.wav", true, false).unwrap();
    assert_eq!(h.output.opened(), 1);
    assert_eq!(h.notices_at(NoticeLevel::Warning), ["Music is already playing"]);

    h.manager.pause(false);
    h.manager.resume("a.wav", true, false).unwrap();
    assert_eq!(h.output.opened(), 2);
    assert_eq!(h.manager.phase(), PlaybackPhase::Playing);
}

#[test]
fn cache_commands_report_through_notices() {
    let h = Harness::new();
    h.add_wav("a.wav");
    h.manager.handle(Command::Play {
        filename: "a.wav".into(),
        looping: false,
        fade: false,
    })
    .unwrap();

    h.manager.handle(Command::CacheRamClear).unwrap();
    h.manager.handle(Command::CacheStats).unwrap();
    let success = h.notices_at(NoticeLevel::Success);
    assert!(success.iter().any(|text| text == "RAM cache cleared (1 entries)"));
    assert_eq!(h.manager.cache_stats().ram_entries, 0);
}
