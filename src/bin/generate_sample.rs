use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

/// Write a synthetic directory of per-frame morphometry CSVs.
#[derive(Parser, Debug)]
struct Args {
    /// Target directory (created if missing)
    #[arg(default_value = "sample_run")]
    dir: PathBuf,

    /// Number of frames
    #[arg(long, default_value_t = 12)]
    frames: usize,

    /// Objects measured per frame
    #[arg(long, default_value_t = 40)]
    objects: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    std::fs::create_dir_all(&args.dir)
        .with_context(|| format!("creating {}", args.dir.display()))?;

    for frame in 0..args.frames {
        // Crystals coarsen over time: mean diameter grows with the frame.
        let mean_diameter = 20.0 + 1.5 * frame as f64;
        let name = format!("img_{frame:04}_morphometry_results.csv");
        let path = args.dir.join(&name);

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        writer.write_record([
            "Label",
            "Area",
            "Diameter",
            "Perimeter",
            "Circularity",
            "Phase",
        ])?;
        for obj in 0..args.objects {
            let diameter = rng.gauss(mean_diameter, 3.0).max(1.0);
            let circularity = rng.gauss(0.85, 0.05).clamp(0.1, 1.0);
            let area = std::f64::consts::PI * diameter * diameter / 4.0;
            let perimeter = std::f64::consts::PI * diameter / circularity.sqrt();
            let phase = if rng.next_f64() < 0.8 { "ice" } else { "brine" };
            writer.write_record([
                (obj + 1).to_string(),
                format!("{area:.3}"),
                format!("{diameter:.3}"),
                format!("{perimeter:.3}"),
                format!("{circularity:.4}"),
                phase.to_string(),
            ])?;
        }
        writer.flush()?;
        log::debug!("wrote {}", path.display());
    }

    println!(
        "Wrote {} frames ({} objects each) to {}",
        args.frames,
        args.objects,
        args.dir.display()
    );
    Ok(())
}
