use clap::{Parser, Subcommand};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::error::Error;
use std::path::PathBuf;

use gridwave_core::{Decoder, Encoder, SAMPLE_RATE};

#[derive(Parser)]
#[command(name = "gridwave")]
#[command(about = "Narrowband message codec for weak-signal audio links")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a message to a 15-second WAV frame
    Encode {
        /// Message text, e.g. "CQ K1ABC FN42"
        message: String,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Base frequency of the lowest tone in Hz
        #[arg(short, long, default_value_t = 1500.0)]
        frequency: f32,
    },

    /// Decode all messages found in a WAV capture
    Decode {
        /// Input WAV file (mono, 12 kHz)
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Synchronization candidate budget
        #[arg(long, default_value_t = 120)]
        max_candidates: usize,
    },
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    match Cli::parse().command {
        Commands::Encode {
            message,
            output,
            frequency,
        } => {
            let samples = Encoder::new().encode(&message, frequency)?;
            let spec = WavSpec {
                channels: 1,
                sample_rate: SAMPLE_RATE as u32,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            };
            let mut writer = WavWriter::create(&output, spec)?;
            for &s in &samples {
                writer.write_sample(s)?;
            }
            writer.finalize()?;
            println!(
                "wrote {} samples ({:.1} s) to {}",
                samples.len(),
                samples.len() as f32 / SAMPLE_RATE as f32,
                output.display()
            );
        }
        Commands::Decode {
            input,
            max_candidates,
        } => {
            let samples = read_wav(&input)?;
            let mut decoder = Decoder::new(max_candidates)?;
            let messages = decoder.decode(&samples)?;
            if messages.is_empty() {
                println!("no messages decoded");
            }
            for m in &messages {
                println!(
                    "{:>6.1} dB  {:>6.2} s  {:>7.1} Hz  {}",
                    m.snr_db, m.time_offset_secs, m.freq_offset_hz, m.text
                );
            }
        }
    }
    Ok(())
}

fn read_wav(path: &PathBuf) -> Result<Vec<f32>, Box<dyn Error>> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_rate != SAMPLE_RATE as u32 {
        return Err(format!(
            "expected a {} Hz capture, got {} Hz",
            SAMPLE_RATE, spec.sample_rate
        )
        .into());
    }

    let channels = spec.channels as usize;
    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    // Keep the first channel of multi-channel captures.
    Ok(samples.into_iter().step_by(channels).collect())
}
