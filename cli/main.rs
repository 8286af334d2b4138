#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use ndarray::{Array1, Array2};
use rand::Rng;
use std::path::PathBuf;
use std::process;

use bayesreg::seeding::seeded_rng;
use bayesreg::{BayesianRegression, EvidenceMethod, FitConfig};

#[derive(Clone, Copy, ValueEnum)]
pub enum MethodCli {
    Em,
    FixedPoint,
}

impl From<MethodCli> for EvidenceMethod {
    fn from(method: MethodCli) -> Self {
        match method {
            MethodCli::Em => EvidenceMethod::Em,
            MethodCli::FixedPoint => EvidenceMethod::FixedPoint,
        }
    }
}

#[derive(Args)]
pub struct DemoArgs {
    /// Number of evenly spaced points on [1, 10]
    #[arg(long, default_value = "100")]
    pub samples: usize,

    /// True slope of the generated line
    #[arg(long, default_value = "4.0")]
    pub slope: f64,

    /// Width of the uniform noise added to each response, U[0, noise)
    #[arg(long, default_value = "5.0")]
    pub noise: f64,

    /// TOML file with method, max_iterations, convergence_threshold and seed
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Evidence approximation update rule (overrides the config file)
    #[arg(long, value_enum)]
    pub method: Option<MethodCli>,

    /// Iteration cap for the evidence approximation (overrides the config file)
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Minimum log-evidence improvement to keep iterating (overrides the config file)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Seed for both the synthetic noise and the initial hyperparameters
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of predictions to print from each end of the range
    #[arg(long, default_value = "5")]
    pub show: usize,
}

#[derive(Parser)]
#[command(
    name = "bayesreg",
    about = "Bayesian linear regression with evidence-approximated precisions",
    long_about = "Fits Bayesian linear regression, estimating the weight prior precision (alpha) \
                 and the noise precision (beta) by type-II maximum likelihood."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the synthetic straight-line problem and print the posterior
    #[command(about = "Fit a synthetic line with uniform noise and report the fit")]
    Demo(DemoArgs),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();
    let result = match command {
        Some(Commands::Demo(args)) => run_demo(args),
        None => {
            if let Err(e) = Cli::command().print_help() {
                eprintln!("Error: {e}");
                process::exit(1);
            }
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn resolve_config(args: &DemoArgs) -> Result<FitConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => FitConfig::load(path)?,
        None => FitConfig::default(),
    };
    if let Some(method) = args.method {
        config.method = method.into();
    }
    if let Some(max_iterations) = args.max_iterations {
        config.max_iterations = max_iterations;
    }
    if let Some(threshold) = args.threshold {
        config.convergence_threshold = threshold;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;
    Ok(config)
}

fn synthetic_line(samples: usize, slope: f64, noise: f64, seed: Option<u64>) -> (Array2<f64>, Array1<f64>) {
    let mut rng = seeded_rng(seed.map(|s| s.wrapping_add(1)));
    let grid = Array1::linspace(1.0, 10.0, samples);
    let x = Array2::from_shape_fn((samples, 1), |(i, _)| grid[i]);
    let y = grid.mapv(|v| {
        let jitter = if noise > 0.0 { rng.gen_range(0.0..noise) } else { 0.0 };
        slope * v + jitter
    });
    (x, y)
}

/// Row indices printed for a table of `n` rows: the first and last `show`,
/// or every row when those would overlap.
fn shown_rows(n: usize, show: usize) -> Vec<usize> {
    let show = show.min(n);
    if 2 * show >= n {
        (0..n).collect()
    } else {
        (0..show).chain(n - show..n).collect()
    }
}

fn run_demo(args: DemoArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.samples < 2 {
        return Err("--samples must be at least 2".into());
    }
    if !(args.noise.is_finite() && args.noise >= 0.0) {
        return Err("--noise must be a non-negative number".into());
    }
    let config = resolve_config(&args)?;
    let (x, y) = synthetic_line(args.samples, args.slope, args.noise, config.seed);

    let mut model = BayesianRegression::from_config(x.view(), y.view(), &config)?;
    let fit = model.fit_with(&config)?.clone();
    let prediction = model.predict_original_scale(x.view())?;

    println!("method:            {}", fit.method);
    println!(
        "status:            {:?} after {} iterations (threshold {:e})",
        fit.status,
        fit.iterations,
        model.threshold()
    );
    println!("alpha (prior):     {:.6e}", fit.hyperparameters.alpha);
    println!(
        "beta (noise):      {:.6e}  (noise variance {:.4})",
        fit.hyperparameters.beta,
        fit.hyperparameters.noise_variance()
    );
    if let Some(score) = fit.final_log_evidence() {
        println!("log evidence:      {score:.6}");
    }
    let sd = fit.posterior.covariance_diagonal(model.factorization()).mapv(f64::sqrt);
    println!(
        "slope:             {:.6} ± {:.6}  (true {})",
        fit.posterior.mean[0], sd[0], args.slope
    );
    println!(
        "intercept:         {:.6}",
        model.dataset().y_mean - fit.posterior.mean.dot(&model.dataset().x_means)
    );

    let (lower, upper) = prediction.interval(1.96);
    println!();
    println!("{:>8} {:>12} {:>12} {:>12} {:>24}", "x", "y", "mean", "variance", "95% interval");
    let n = prediction.len();
    let show = args.show.min(n);
    for (position, &i) in shown_rows(n, show).iter().enumerate() {
        if position == show && 2 * show < n {
            println!("{:>8}", "...");
        }
        println!(
            "{:>8.3} {:>12.4} {:>12.4} {:>12.4} {:>11.4} .. {:<11.4}",
            x[[i, 0]],
            y[i],
            prediction.mean[i],
            prediction.variance[i],
            lower[i],
            upper[i]
        );
    }

    Ok(())
}
