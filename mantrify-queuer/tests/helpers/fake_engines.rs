//! Shell-script stand-ins for the external audio engines
//!
//! Each script copies the input file it was given into a capture directory
//! (so tests can inspect exactly what the engine saw) and prints marker
//! lines the way the real engines do. Every run also appends `<engine> start`
//! and `<engine> end` to a shared run log, so tests can check that runs never
//! overlap.

use mantrify_queuer::config::QueuerConfig;
use std::path::Path;

/// Shared start/end log written by both scripts, relative to the test root
pub const RUN_LOG: &str = "engine_runs.log";

/// Behaviour of the fake TTS engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeTts {
    /// One marker line per input row
    Normal,
    /// Prints to stderr and exits 1
    Fail,
    /// Reports at most this many files
    ReportOnly(usize),
}

/// Write both scripts under `root` and point the config at them
pub fn install(config: &mut QueuerConfig, root: &Path, tts: FakeTts) {
    let tts_dir = config.paths.tts_csv_dir.display().to_string();
    let concat_dir = config.paths.concat_csv_dir.display().to_string();
    let captured_tts = root.join("captured_tts").display().to_string();
    let captured_concat = root.join("captured_concat").display().to_string();
    let audio_out = root.join("audio_out").display().to_string();
    let run_log = root.join(RUN_LOG).display().to_string();

    let tts_body = match tts {
        FakeTts::Fail => "echo \"quota exceeded\" >&2\nexit 1\n".to_string(),
        FakeTts::Normal => report_rows(&audio_out, usize::MAX),
        FakeTts::ReportOnly(limit) => report_rows(&audio_out, limit),
    };

    let tts_script = format!(
        "#!/bin/sh\n\
         # usage: tts --file_name <name>\n\
         echo \"tts start\" >> \"{run_log}\"\n\
         trap 'echo \"tts end\" >> \"{run_log}\"' EXIT\n\
         sleep 0.2\n\
         [ \"$1\" = \"--file_name\" ] || exit 64\n\
         input=\"{tts_dir}/$2\"\n\
         cp \"$input\" \"{captured_tts}/\"\n\
         echo \"TTS engine app=$NAME_APP\"\n\
         {tts_body}"
    );

    let concat_script = format!(
        "#!/bin/sh\n\
         echo \"concat start\" >> \"{run_log}\"\n\
         trap 'echo \"concat end\" >> \"{run_log}\"' EXIT\n\
         [ \"$1\" = \"--file_name\" ] || exit 64\n\
         input=\"{concat_dir}/$2\"\n\
         cp \"$input\" \"{captured_concat}/\"\n\
         name=$(basename \"$2\" .csv)\n\
         echo \"Audio file created successfully: {audio_out}/$name.mp3\"\n"
    );

    let tts_path = root.join("fake_tts.sh");
    let concat_path = root.join("fake_concat.sh");
    write_executable(&tts_path, &tts_script);
    write_executable(&concat_path, &concat_script);

    config.tts.program = tts_path.display().to_string();
    config.tts.args = Vec::new();
    config.concatenator.program = concat_path.display().to_string();
    config.concatenator.args = Vec::new();
}

/// Script fragment printing one marker per data row, up to `limit`
fn report_rows(audio_out: &str, limit: usize) -> String {
    let limit = limit.min(1_000_000);
    format!(
        "n=0\n\
         tail -n +2 \"$input\" | while IFS= read -r line; do\n\
         \x20 [ -z \"$line\" ] && continue\n\
         \x20 n=$((n + 1))\n\
         \x20 [ \"$n\" -le {limit} ] || continue\n\
         \x20 echo \"Audio file created successfully: {audio_out}/speech_$n.mp3\"\n\
         done\n"
    )
}

#[cfg(unix)]
fn write_executable(path: &Path, content: &str) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, content).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn write_executable(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}
