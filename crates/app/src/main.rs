use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use voice_mixer_core::{AppConfig, SoundCache, SoundPlayer};

fn main() -> voice_mixer_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Render { output, mix } => run_render(&config, &output, &mix),
        #[cfg(feature = "cpal")]
        Commands::Play { mix } => run_play(&config, &mix),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> voice_mixer_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            AppConfig::from_path(path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn run_render(config: &AppConfig, output: &Path, mix: &MixArgs) -> voice_mixer_core::Result<()> {
    tracing::info!(?output, seconds = mix.seconds, "rendering mix offline");

    let mut player = SoundPlayer::with_null_backend(config.mixer.clone())?;
    player.init()?;
    let mut cache = SoundCache::new();
    start_sources(&player, &mut cache, mix)?;

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: config.mixer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output, spec)?;

    let block_frames = config.mixer.buffer_frames;
    let mut block = vec![0_i16; block_frames * 2];
    let mut remaining = frames_for(mix.seconds, config.mixer.sample_rate);
    while remaining > 0 {
        let frames = remaining.min(block_frames);
        let out = &mut block[..frames * 2];
        player.render(out);
        for &sample in out.iter() {
            writer.write_sample(sample)?;
        }
        remaining -= frames;
    }
    writer.finalize()?;

    cache.clear(&player)?;
    player.shutdown()
}

#[cfg(feature = "cpal")]
fn run_play(config: &AppConfig, mix: &MixArgs) -> voice_mixer_core::Result<()> {
    tracing::info!(seconds = mix.seconds, "playing mix on the default device");

    let backend = Box::new(voice_mixer_core::CpalBackend::new());
    let mut player = SoundPlayer::new(config.mixer.clone(), backend)?;
    player.init()?;
    let mut cache = SoundCache::new();
    start_sources(&player, &mut cache, mix)?;

    std::thread::sleep(std::time::Duration::from_secs_f32(mix.seconds.max(0.0)));

    cache.clear(&player)?;
    player.shutdown()
}

fn start_sources(
    player: &SoundPlayer,
    cache: &mut SoundCache,
    mix: &MixArgs,
) -> voice_mixer_core::Result<()> {
    if let Some(music) = &mix.music {
        player.play_music(music, mix.loop_music)?;
        player.set_music_volume(mix.music_volume)?;
    }

    for path in &mix.sounds {
        let sound = cache.load(path)?;
        match player.play_sound(&sound, mix.volume, mix.looping)? {
            Some(id) => tracing::info!(%id, path = %path.display(), "playing sound"),
            None => tracing::warn!(path = %path.display(), "sound dropped, no free voice"),
        }
    }
    Ok(())
}

fn frames_for(seconds: f32, sample_rate: u32) -> usize {
    (seconds.max(0.0) * sample_rate as f32) as usize
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Fixed-point polyphonic sample mixer", long_about = None)]
struct Cli {
    /// JSON configuration file. Defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mix WAV files offline into a 16-bit stereo WAV file.
    Render {
        /// Path of the WAV file to write.
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        mix: MixArgs,
    },
    /// Play WAV files on the default output device.
    #[cfg(feature = "cpal")]
    Play {
        #[command(flatten)]
        mix: MixArgs,
    },
    /// Print the effective configuration as JSON.
    Config,
}

#[derive(Args, Debug)]
struct MixArgs {
    /// Sound effects started together at time zero.
    sounds: Vec<PathBuf>,
    /// Length of the mix in seconds.
    #[arg(short, long, default_value_t = 2.0)]
    seconds: f32,
    #[arg(long, default_value_t = 1.0)]
    volume: f32,
    /// Loop every sound effect.
    #[arg(long = "loop")]
    looping: bool,
    /// WAV file streamed as background music.
    #[arg(short, long)]
    music: Option<PathBuf>,
    #[arg(long)]
    loop_music: bool,
    #[arg(long, default_value_t = 1.0)]
    music_volume: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_render_arguments() {
        let cli = Cli::parse_from([
            "voice-mixer",
            "render",
            "--output",
            "out.wav",
            "--seconds",
            "0.5",
            "--loop",
            "a.wav",
            "b.wav",
        ]);
        match cli.command {
            Commands::Render { output, mix } => {
                assert_eq!(output, PathBuf::from("out.wav"));
                assert_eq!(mix.sounds.len(), 2);
                assert!(mix.looping);
                assert_eq!(mix.seconds, 0.5);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn frame_count_rounds_down() {
        assert_eq!(frames_for(0.5, 44_100), 22_050);
        assert_eq!(frames_for(-1.0, 44_100), 0);
    }

    #[test]
    fn renders_a_wav_file() {
        let dir = std::env::temp_dir();
        let input = dir.join(format!("voice-mixer-app-in-{}.wav", std::process::id()));
        let output = dir.join(format!("voice-mixer-app-out-{}.wav", std::process::id()));

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&input, spec).unwrap();
        for _ in 0..8 {
            writer.write_sample(1234_i16).unwrap();
        }
        writer.finalize().unwrap();

        let mut config = AppConfig::default();
        config.mixer.sample_rate = 8_000;
        config.mixer.buffer_frames = 4;
        let mix = MixArgs {
            sounds: vec![input.clone()],
            seconds: 0.002,
            volume: 1.0,
            looping: false,
            music: None,
            loop_music: false,
            music_volume: 1.0,
        };
        run_render(&config, &output, &mix).unwrap();

        let mut reader = hound::WavReader::open(&output).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 32);
        assert!(samples.iter().take(16).all(|&s| s == 1234));
        assert!(samples.iter().skip(16).all(|&s| s == 0));

        std::fs::remove_file(input).ok();
        std::fs::remove_file(output).ok();
    }
}
