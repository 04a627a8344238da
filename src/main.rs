#![allow(clippy::enum_glob_use)]

use std::process::ExitCode;
use std::time::Instant;

use clap::{CommandFactory, Parser};
use clap_complete::Shell;

use bffsoup::config::{DriverConfig, SoupConfig};
use bffsoup::driver::Driver;
use bffsoup::observability::{kolmogorov_estimate, shannon_entropy};

/// A headless runner for the primordial-soup simulation.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// soup width in bytes
    #[arg(long, default_value_t = 64)]
    width: u32,

    /// soup height in bytes
    #[arg(long, default_value_t = 32_768)]
    height: u32,

    /// bytes per region (power of two)
    #[arg(long = "region-size", default_value_t = 64)]
    region_size: u32,

    /// byte granularity of selection starts (power of two, <= region-size)
    #[arg(long, default_value_t = 64)]
    alignment: u32,

    /// max inter-pair distance, in percent of soup; omit for unconstrained
    #[arg(long = "locality-limit")]
    locality_limit: Option<f64>,

    /// initial head1 position in the tape; defaults to region-size
    #[arg(long = "head1-offset")]
    head1_offset: Option<u32>,

    /// interpreter step cap per pair (power of two)
    #[arg(long = "max-steps", default_value_t = 8192)]
    max_steps: u32,

    /// per-byte mutation probability in regions touched by a step
    #[arg(long = "mutation-rate", default_value_t = 0.000_24)]
    mutation_rate: f64,

    /// number of pairs selected per driver tick
    #[arg(long = "pairs-per-step", default_value_t = 1000)]
    pairs_per_step: u32,

    /// back-pressure limit on outstanding dispatches
    #[arg(long = "max-pending", default_value_t = 50)]
    max_pending: u32,

    /// RNG seed; omit for an OS-entropy-derived seed
    #[arg(long)]
    seed: Option<u64>,

    /// stop after this many ticks; omit to run until interrupted
    #[arg(long)]
    ticks: Option<u32>,

    /// print a Shannon entropy / Kolmogorov estimate report periodically
    #[arg(long = "report-complexity", default_value_t = false)]
    report_complexity: bool,

    /// print a shell completion script for the given shell and exit
    #[arg(long = "generate-completions", value_name = "SHELL")]
    generate_completions: Option<Shell>,
}

impl Cli {
    fn soup_config(&self) -> SoupConfig {
        let region_size = self.region_size;
        SoupConfig {
            width: self.width,
            height: self.height,
            region_size,
            alignment: self.alignment,
            locality_limit: self.locality_limit,
            head1_offset: self.head1_offset.unwrap_or(region_size),
            max_steps: self.max_steps,
            mutation_rate: self.mutation_rate,
        }
    }

    fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            pairs_per_step: self.pairs_per_step,
            max_pending: self.max_pending,
        }
    }
}

fn seed_from_entropy() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish()
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(shell) = cli.generate_completions {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
        return ExitCode::SUCCESS;
    }

    let seed = cli.seed.unwrap_or_else(seed_from_entropy);

    let mut driver = match Driver::new(cli.soup_config(), cli.driver_config(), seed) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("\u{1b}[91mERROR\u{1b}[0m: {e}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "soup: {} bytes, {} regions, seed {seed}",
        driver.soup().len(),
        driver.soup().config().num_tapes()
    );

    let start = Instant::now();
    let mut tick_index: u64 = 0;

    loop {
        if let Some(limit) = cli.ticks {
            if tick_index >= u64::from(limit) {
                break;
            }
        }

        let Some(agg) = driver.tick() else {
            continue;
        };
        tick_index += 1;

        if cli.report_complexity && driver.should_report(1000) {
            let snapshot = driver.soup().snapshot_view(0, driver.soup().len());
            let entropy = shannon_entropy(&snapshot);
            let kolmogorov = kolmogorov_estimate(&snapshot);
            eprintln!(
                "epoch {:.3} | head0={} head1={} math={} copy={} loop={} | entropy={:.3} bits/byte kolmogorov={:.3} bits/byte",
                driver.epoch(),
                agg.head0,
                agg.head1,
                agg.math,
                agg.copy,
                agg.loop_,
                entropy,
                kolmogorov,
            );
        }
    }

    eprintln!(
        "ran {tick_index} ticks in {:.2?} (epoch {:.3})",
        start.elapsed(),
        driver.epoch()
    );

    ExitCode::SUCCESS
}
