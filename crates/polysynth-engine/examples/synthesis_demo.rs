//! Synthesis demo: waveforms, envelopes, and the voice pool limit.
//!
//! Run with: cargo run -p polysynth-engine --example synthesis_demo

use polysynth_engine::pitch::{frequency, parse_note};
use polysynth_engine::{EngineError, EnvelopeParams, Synthesizer, WaveformId, WaveformRegistry};

fn main() {
    let sample_rate = 44100.0;

    // --- Registry waveforms ---
    println!("=== Waveforms (441 Hz, every 10th of the first 100 samples) ===\n");

    let registry = WaveformRegistry::new();
    for entry in registry.iter() {
        let mut buf = [0.0f32; 100];
        registry.generate(entry.id(), 441.0, sample_rate, &mut buf);
        let shown: Vec<String> = buf.iter().step_by(10).map(|s| format!("{s:>6.3}")).collect();
        println!("{:<10} {}", entry.name(), shown.join(" "));
    }

    // --- Envelope shaping a note ---
    println!("\n=== Envelope Shaping an A4 Sine ===\n");

    let synth = Synthesizer::init(4, sample_rate, 1).expect("engine init");
    let params = EnvelopeParams::new(0.01, 0.05, 0.6, 0.1);
    let voice = synth
        .trigger_note_with(frequency(69), 0.8, WaveformId::SINE, params)
        .expect("trigger");

    let mut buf = vec![0.0f32; 441];
    println!("Time (ms) | Stage   | Level  | Peak out");
    println!("----------+---------+--------+---------");
    for block in 0..20 {
        if block == 8 {
            synth.release_note(voice).expect("release");
            println!("--- release ---");
        }
        synth.process_buffer(&mut buf, 441);
        let peak = buf.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        match synth.voice(voice) {
            Some(v) if v.is_active() => println!(
                "{:>9} | {:<7} | {:>6.3} | {:>7.3}",
                (block + 1) * 10,
                format!("{:?}", v.envelope().stage()),
                v.envelope().level(),
                peak
            ),
            _ => {
                println!("{:>9} | Idle    | voice returned to pool", (block + 1) * 10);
                break;
            }
        }
    }

    // --- Polyphony limit ---
    println!("\n=== Chord on a 4-voice pool ===\n");

    for name in ["C4", "E4", "G4", "B4", "D5"] {
        let Ok(note) = parse_note(name) else { continue };
        match synth.trigger_note(frequency(note), 0.25, WaveformId::TRIANGLE) {
            Ok(index) => println!("{name:<3} ({:>7.2} Hz) -> voice {index}", frequency(note)),
            Err(EngineError::VoiceExhausted { max_voices }) => {
                println!("{name:<3} rejected: all {max_voices} voices busy");
            }
            Err(e) => println!("{name:<3} failed: {e}"),
        }
    }

    println!("\nSynthesis demo complete.");
}
