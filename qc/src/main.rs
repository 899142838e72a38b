use clap::Parser;
use glob::glob;
use std::path::{Path, PathBuf};
use qc::confounds::{self, after_first, mean_ignoring_missing};
use qc::group_stats::{self, GroupStatsSettings};
use qc::merge;
use qc::report::{classify, MeanFdReport, MotionReport, MotionThresholds};
use qc::table::Table;

#[derive(clap::Parser,Debug)]
pub struct QcArgs {
    #[command(subcommand)]
    pub action: QcAction,
}

#[derive(clap::Subcommand,Debug)]
pub enum QcAction {
    /// mean framewise displacement per subject from diffusion confound tables
    DwiReport(DwiReportArgs),
    /// head-motion screening per subject from bold confound tables
    BoldReport(BoldReportArgs),
    /// join per-modality reports onto a base subject table
    Merge(MergeArgs),
    /// per-group pass/fail counts over a merged table
    GroupStats(GroupStatsArgs),
}

#[derive(Clone,clap::Args,Debug)]
pub struct DwiReportArgs {
    /// glob matching one directory per subject (e.g. /results/qsiprep/sub-*/qsiprep/sub-*)
    subjects_glob:String,
    /// output csv
    output:PathBuf,
}

#[derive(Clone,clap::Args,Debug)]
pub struct BoldReportArgs {
    /// glob matching one directory per subject (e.g. /results/fmriprep/sub-*/fmriprep/sub-*)
    subjects_glob:String,
    /// task entity to screen (e.g. task-rest)
    task:String,
    /// output csv
    output:PathBuf,
    /// run entity filter (e.g. run-1)
    #[clap(long)]
    run:Option<String>,
    /// mean framewise displacement cutoff
    #[clap(long)]
    threshold_meanfd:Option<f64>,
    /// per-frame displacement cutoff
    #[clap(long)]
    threshold_framefd:Option<f64>,
    /// how many frames over the cutoff a subject may have
    #[clap(long)]
    frame_num_threshold:Option<usize>,
    /// no frame may ever exceed this displacement
    #[clap(long)]
    threshold_framefd_max:Option<f64>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct MergeArgs {
    /// base subject table (one row per enrolled subject)
    base_csv:PathBuf,
    /// directory holding the *_summary.csv reports
    qc_dir:PathBuf,
    /// output csv
    output:PathBuf,
    /// subject id column of the base table
    #[clap(long,default_value="subj_ID")]
    key_column:String,
}

#[derive(Clone,clap::Args,Debug)]
pub struct GroupStatsArgs {
    /// merged qc table
    input:PathBuf,
    /// output csv
    output:PathBuf,
    /// column holding the group membership string
    #[clap(long,default_value="group")]
    group_column:String,
    /// comma-separated group labels matched as substrings (e.g. ADHD,DD)
    #[clap(long)]
    labels:Option<String>,
    /// group assigned to rows with an empty or NA membership string
    #[clap(long,default_value="TD")]
    control_label:String,
    /// FD cutoff for bold modalities
    #[clap(long)]
    fd_threshold:Option<f64>,
    /// FD cutoff for the dwi modality
    #[clap(long)]
    dwi_fd_threshold:Option<f64>,
}

fn main() {
    let args = QcArgs::parse();
    match args.action {
        QcAction::DwiReport(args) => dwi_report(args),
        QcAction::BoldReport(args) => bold_report(args),
        QcAction::Merge(args) => merge_tables(args),
        QcAction::GroupStats(args) => run_group_stats(args),
    }
}

fn subject_dirs(pattern:&str) -> Vec<PathBuf> {
    let mut dirs:Vec<PathBuf> = glob(pattern).expect("failed to read glob pattern")
        .flat_map(|m| m)
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn subject_name(dir:&Path) -> String {
    dir.file_name().unwrap().to_string_lossy().to_string()
}

/// per-file means averaged together, first sample of each trace excluded
fn mean_fd_over_files(files:&[PathBuf],column:&str) -> Option<f64> {
    let mut per_file = Vec::<f64>::new();
    for f in files {
        match confounds::read_column(f,column) {
            Ok(values) => {
                if let Some(m) = mean_ignoring_missing(after_first(&values)) {
                    per_file.push(m);
                }
            }
            Err(e) => {
                println!("WARN: {:?}: {:?}",f,e);
            }
        }
    }
    match per_file.is_empty() {
        true => None,
        false => Some(per_file.iter().sum::<f64>()/per_file.len() as f64)
    }
}

fn dwi_report(args:DwiReportArgs) {
    let dirs = subject_dirs(&args.subjects_glob);
    println!("found {} subject directories",dirs.len());
    let mut report = MeanFdReport::new();
    for dir in &dirs {
        let confound_files = utils::get_all_matches(&dir.join("dwi"),"*confounds.tsv").unwrap_or(Vec::new());
        let mean_fd = mean_fd_over_files(&confound_files,"framewise_displacement");
        // subjects with no usable confounds keep an empty row
        report.push(&subject_name(dir),mean_fd);
    }
    report.write_csv(&args.output);
    println!("{} subjects reported",report.n_rows());
}

fn bold_report(args:BoldReportArgs) {
    let mut thresholds = MotionThresholds::default();
    if let Some(v) = args.threshold_meanfd { thresholds.mean_fd = v }
    if let Some(v) = args.threshold_framefd { thresholds.frame_fd = v }
    if let Some(v) = args.frame_num_threshold { thresholds.frame_count = v }
    if let Some(v) = args.threshold_framefd_max { thresholds.max_fd = v }

    let pattern = match &args.run {
        Some(run) => format!("*{}*{}*desc-confounds_timeseries.tsv",args.task,run),
        None => format!("*{}*desc-confounds_timeseries.tsv",args.task)
    };

    let dirs = subject_dirs(&args.subjects_glob);
    println!("found {} subject directories",dirs.len());
    let mut report = MotionReport::new(&thresholds);
    for dir in &dirs {
        let confound_files = utils::get_all_matches(&dir.join("func"),&pattern).unwrap_or(Vec::new());
        match confound_files.first() {
            Some(f) => {
                match confounds::read_column(f,"rmsd") {
                    Ok(values) => {
                        match classify(&values,&thresholds) {
                            Some(summary) => report.push(&subject_name(dir),Some(summary)),
                            // a trace with no usable samples drops the subject
                            None => println!("WARN: no usable samples in {:?}",f)
                        }
                    }
                    Err(e) => {
                        println!("WARN: {:?}: {:?}",f,e);
                    }
                }
            }
            None => {
                println!("WARN: no confounds match {} for {}",pattern,subject_name(dir));
            }
        }
    }
    report.write_csv(&args.output);
    println!("{} of {} screened subjects look good",report.n_good(),report.n_rows());
}

fn merge_tables(args:MergeArgs) {
    match merge::merge_reports(&args.base_csv,&args.key_column,&args.qc_dir,&args.output) {
        Ok(table) => println!("merged table has {} rows and {} columns",table.rows.len(),table.header.len()),
        Err(e) => {
            eprintln!("ERROR: merge failed: {:?}",e);
            std::process::exit(1);
        }
    }
}

fn run_group_stats(args:GroupStatsArgs) {
    let mut settings = GroupStatsSettings::default();
    settings.group_column = args.group_column.clone();
    settings.control_label = args.control_label.clone();
    if let Some(v) = args.fd_threshold { settings.fd_threshold = v }
    if let Some(v) = args.dwi_fd_threshold { settings.dwi_fd_threshold = v }
    if let Some(labels) = &args.labels {
        settings.labels = labels.split(',').map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect();
    }

    let table = match Table::from_csv(&args.input) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("ERROR: cannot read {:?}: {:?}",args.input,e);
            std::process::exit(1);
        }
    };

    match group_stats::group_stats(&table,&settings) {
        Ok(stats) => {
            group_stats::write_stats(&stats,&args.output);
            group_stats::print_stats(&stats);
        }
        Err(e) => {
            eprintln!("ERROR: group stats failed: {:?}",e);
            std::process::exit(1);
        }
    }
}
