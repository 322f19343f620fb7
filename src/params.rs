use std::fmt::Display;

use lazy_static::lazy_static;

lazy_static! {
  pub static ref DEFAULT_PARAMS: Params = Params {
    // Measure azimuth vertex to star unless inverted
    inverse: false,

    // How often to log progress (in pairs)
    progress_every: 1000,

    // Default to system physical cores (to prevent interference from hyperthreading)
    n_threads: num_cpus::get_physical(),
  };
}

/// Tangent batch parameters.
#[derive(Copy, Clone, Debug)]
pub struct Params {
    /// Measure azimuth star to vertex instead of vertex to star. Some
    /// point/polygon arrangements need the flipped direction to produce
    /// usable tangents.
    pub inverse: bool,

    /// How often to log progress (in processed pairs). 0 is never.
    pub progress_every: usize,

    /// Number of worker threads for the parallel driver.
    pub n_threads: usize,
}

impl Display for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "===== Tangent Batch Parameters =====")?;
        writeln!(f, "\t - inverse (azimuth star to vertex): {}", self.inverse)?;
        writeln!(
            f,
            "\t - progress_every (pairs between progress logs): {}",
            self.progress_every
        )?;
        writeln!(f, "\t - n_threads (n threads to use): {}", self.n_threads)
    }
}
