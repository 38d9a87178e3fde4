use std::path::PathBuf;

use clap::Parser;
use env_logger::{Builder, Env};
use log::LevelFilter;

use crate::analysis::AnalysisConfig;
use crate::report::ReportFormat;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct HeartArgs {
    #[clap(short, long, value_parser, default_value = "data",
    help = "Directory holding one sub-directory per dataset id")]
    pub data_dir: PathBuf,
    #[clap(long, default_value_t = 45, help = "Dataset id to analyse")]
    pub dataset_id: u32,
    #[clap(long, default_value_t = 0.05, help = "Significance threshold")]
    pub alpha: f64,
    #[clap(long, default_value_t = 240.0,
    help = "Cholesterol level (mg/dl) considered high")]
    pub chol_threshold: f64,
    #[clap(long, default_value_t = 0.08,
    help = "Reference share of high fasting blood sugar")]
    pub fbs_rate: f64,
    #[clap(long, help = "Use Welch's unequal-variance two-sample t-test")]
    pub welch: bool,
    #[clap(short, long, value_enum, default_value_t = ReportFormat::Text,
    help = "Report format")]
    pub format: ReportFormat,
    #[clap(short, long, value_parser,
    help = "Write the labeled table to this .csv or .parquet file")]
    pub export: Option<PathBuf>,
    #[clap(short, long, action = clap::ArgAction::Count,
    help = "Verbose level")]
    pub verbose: u8,
}

impl HeartArgs {
    pub fn config(&self) -> AnalysisConfig {
        AnalysisConfig {
            alpha: self.alpha,
            chol_threshold: self.chol_threshold,
            fbs_rate: self.fbs_rate,
            equal_var: !self.welch,
        }
    }
}

/// Log to stderr at the level chosen by `-v`; `HEART_LOG` adds filters.
pub fn init_logger(verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let env = Env::new().filter("HEART_LOG");
    let _ = Builder::new()
        .filter(Some("heart_hypotheses"), log_level)
        .parse_env(env)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reproduce_the_reference_analysis() {
        let args = HeartArgs::parse_from(["heart-hypotheses"]);
        assert_eq!(args.data_dir, PathBuf::from("data"));
        assert_eq!(args.dataset_id, 45);
        assert_eq!(args.format, ReportFormat::Text);
        assert_eq!(args.config(), AnalysisConfig::default());
    }

    #[test]
    fn flags_override_config() {
        let args = HeartArgs::parse_from([
            "heart-hypotheses",
            "--welch",
            "--alpha",
            "0.01",
            "-f",
            "json",
            "-vv",
            "--export",
            "out.parquet",
        ]);
        let config = args.config();
        assert!(!config.equal_var);
        assert_eq!(config.alpha, 0.01);
        assert_eq!(args.format, ReportFormat::Json);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.export, Some(PathBuf::from("out.parquet")));
    }
}
