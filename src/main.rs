#[cfg(not(feature = "streaming"))]
fn main() {
    eprintln!(
        "The lumpsound CLI requires the \"streaming\" feature. \
         Rebuild with `--features streaming` to enable playback."
    );
}

#[cfg(feature = "streaming")]
mod cli {
    use anyhow::{anyhow, bail, Context};
    use lumpsound::{MixerConfig, RodioTransport, SoundSystem};
    use std::env;
    use std::fs;
    use std::thread;
    use std::time::{Duration, Instant};
    use tracing::info;
    use tracing_subscriber::EnvFilter;

    /// Default music play time when `--seconds` is not given
    const DEFAULT_MUSIC_SECONDS: f32 = 30.0;

    /// Interval between transport event pumps
    const PUMP_INTERVAL: Duration = Duration::from_millis(10);

    struct Options {
        path: String,
        sfx: bool,
        looping: bool,
        volume: u8,
        seconds: Option<f32>,
        config: Option<String>,
    }

    const USAGE: &str = "Usage:\n  lumpsound [--sfx] [--loop] [--volume N] [--seconds N] \
        [--config FILE] <file>\n\nFlags:\n  --sfx            Play the file as a sound effect \
        (default: music)\n  --loop           Loop music\n  --volume N       Volume 0-31 \
        (default 31)\n  --seconds N      Stop after N seconds\n  --config FILE    Mixer \
        configuration (JSON)\n  -h, --help       Show this help\n";

    fn value<T: std::str::FromStr>(flag: &str, arg: Option<String>) -> anyhow::Result<T> {
        let arg = arg.ok_or_else(|| anyhow!("{} requires an argument", flag))?;
        arg.parse()
            .map_err(|_| anyhow!("invalid value for {}: {}", flag, arg))
    }

    fn parse_args() -> anyhow::Result<Option<Options>> {
        let mut path = None;
        let mut options = Options {
            path: String::new(),
            sfx: false,
            looping: false,
            volume: 31,
            seconds: None,
            config: None,
        };
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--sfx" => options.sfx = true,
                "--loop" => options.looping = true,
                "--volume" => options.volume = value::<u8>("--volume", args.next())?.min(31),
                "--seconds" => options.seconds = Some(value("--seconds", args.next())?),
                "--config" => options.config = Some(value("--config", args.next())?),
                "--help" | "-h" => {
                    print!("{}", USAGE);
                    return Ok(None);
                }
                _ if arg.starts_with("--") => bail!("unknown flag {}\n\n{}", arg, USAGE),
                _ => path = Some(arg),
            }
        }
        options.path = path.ok_or_else(|| anyhow!("no input file\n\n{}", USAGE))?;
        Ok(Some(options))
    }

    pub fn run() -> anyhow::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();

        let Some(options) = parse_args()? else {
            return Ok(());
        };
        let config = match &options.config {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path))?;
                MixerConfig::from_json(&json)?
            }
            None => MixerConfig::default(),
        };
        let data = fs::read(&options.path).with_context(|| format!("reading {}", options.path))?;

        let mut system = SoundSystem::startup(config, RodioTransport::new(), None)?;
        let play_for = if options.sfx {
            system.set_sfx_volume(options.volume);
            let chunk = system.load_sfx(&data)?;
            info!(
                "Sound effect: {} frames ({:.2}s, {:?})",
                chunk.frames(),
                chunk.duration_secs(),
                chunk.owner()
            );
            system.start_sound(&chunk, 255, 128, 0, 0, None)?;
            let length = chunk.duration_secs();
            // The voice keeps its own reference to the samples
            system.free_sfx(chunk);
            options.seconds.unwrap_or(length)
        } else {
            system.load_song(&data)?;
            system.set_music_volume(options.volume);
            info!(
                "Music: {:?}, loop point {:.3}s",
                system.song_type(),
                system.controller().loop_point().seconds
            );
            system.play_song(options.looping)?;
            options.seconds.unwrap_or(DEFAULT_MUSIC_SECONDS)
        };

        let deadline = Instant::now() + Duration::from_secs_f32(play_for.max(0.0));
        while Instant::now() < deadline {
            system.pump();
            thread::sleep(PUMP_INTERVAL);
        }

        system.shutdown();
        Ok(())
    }
}

#[cfg(feature = "streaming")]
fn main() -> anyhow::Result<()> {
    cli::run()
}
