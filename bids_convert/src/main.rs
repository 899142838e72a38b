use clap::Parser;
use std::path::PathBuf;
use bids::layout::Subject;
use bids_convert::convert::{execute, subject_from_src_dir, ConversionPlanner};
use bids_convert::hcp::plan_hcp;
use bids_convert::rules::{Config, ConfigFile, SeriesRules};

#[derive(clap::Parser,Debug)]
pub struct ConvertArgs {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(clap::Subcommand,Debug)]
pub enum Action {
    /// sort a raw scanner export into a BIDS subject tree
    ToBids(ToBidsArgs),
    /// reshape a BIDS tree into the unprocessed hcp-style layout
    ToHcp(ToHcpArgs),
    /// create a new series rules template to modify for another protocol
    NewRulesTemplate(TemplateArgs),
}

#[derive(Clone,clap::Args,Debug)]
pub struct ToBidsArgs {
    /// directory of raw scanner nifti exports (.nii.gz/.json/.bval/.bvec)
    #[clap(long)]
    src_dir:PathBuf,
    /// output root. anat/dwi/fmap/func subdirectories are created under it
    #[clap(long)]
    out_dir:PathBuf,
    /// text file listing the files to consider, one per line relative to src-dir.
    /// When omitted, every file in src-dir is considered
    #[clap(long)]
    src_list:Option<PathBuf>,
    /// BIDS subject label. Defaults to an inference from the src-dir name
    #[clap(long)]
    subject:Option<String>,
    /// marker the subject inference starts from in the directory name
    #[clap(long)]
    subject_marker:Option<String>,
    /// series classification rules file. Defaults to the site protocol
    #[clap(long)]
    rules:Option<PathBuf>,
    /// show the planned copies without writing anything
    #[clap(long)]
    dry_run:bool,
}

#[derive(Clone,clap::Args,Debug)]
pub struct ToHcpArgs {
    /// root of the input BIDS tree (sub-*/ses-*/...)
    input_bids:PathBuf,
    /// output root for the hcp-style tree
    output:PathBuf,
    /// show the planned copies without writing anything
    #[clap(long)]
    dry_run:bool,
}

#[derive(Clone,clap::Args,Debug)]
pub struct TemplateArgs {
    /// absolute path to the new rules file, or just a file name to save to the working directory.
    /// your file extension will not be respected.
    output_config:PathBuf,
}

fn main() {
    let args = ConvertArgs::parse();
    match args.action {
        Action::NewRulesTemplate(args) => {
            SeriesRules::default().to_file(&args.output_config);
            println!("wrote rules template {:?}",args.output_config);
        }
        Action::ToBids(args) => to_bids(args),
        Action::ToHcp(args) => to_hcp(args),
    }
}

fn to_bids(args:ToBidsArgs) {
    if !args.src_dir.exists() {
        eprintln!("ERROR: src-dir does not exist: {:?}",args.src_dir);
        std::process::exit(1);
    }

    let rules = match &args.rules {
        Some(path) => SeriesRules::from_file(path),
        None => SeriesRules::default()
    };

    let subject = match &args.subject {
        Some(label) => Subject::new(label),
        None => subject_from_src_dir(&args.src_dir,args.subject_marker.as_deref())
    };
    println!("converting {:?} as {}",args.src_dir,subject.id());

    let basenames = gather_basenames(&args);
    println!("{} candidate files",basenames.len());

    for modality in ["anat","dwi","fmap","func"] {
        std::fs::create_dir_all(args.out_dir.join(modality)).expect("cannot create output directory");
    }

    let planner = ConversionPlanner::new(&args.src_dir,&args.out_dir,&subject,&rules,&basenames);
    let plans = planner.plan();
    match execute(&plans,args.dry_run) {
        Ok(n) => println!("{} files {}",n,if args.dry_run {"planned"} else {"copied"}),
        Err(e) => {
            eprintln!("ERROR: {}",e);
            std::process::exit(1);
        }
    }
}

fn to_hcp(args:ToHcpArgs) {
    if !args.input_bids.exists() {
        eprintln!("ERROR: input BIDS tree does not exist: {:?}",args.input_bids);
        std::process::exit(1);
    }
    let plans = plan_hcp(&args.input_bids,&args.output);
    if plans.is_empty() {
        println!("WARN: nothing to convert under {:?}",args.input_bids);
        return
    }
    match execute(&plans,args.dry_run) {
        Ok(n) => println!("{} files {}",n,if args.dry_run {"planned"} else {"copied"}),
        Err(e) => {
            eprintln!("ERROR: {}",e);
            std::process::exit(1);
        }
    }
}

fn gather_basenames(args:&ToBidsArgs) -> Vec<String> {
    match &args.src_list {
        Some(list) => {
            let entries = utils::read_list_file(list);
            let mut names = Vec::<String>::new();
            let mut n_missing = 0;
            for entry in entries {
                // tree-drawing characters sneak into lists pasted from
                // directory listings
                let clean = entry.replace("│","").replace("├","").replace("└","").trim().to_string();
                if clean.is_empty() {
                    continue
                }
                match args.src_dir.join(&clean).exists() {
                    true => names.push(clean),
                    false => n_missing += 1
                }
            }
            if n_missing > 0 {
                println!("WARN: {} listed files were not found in src-dir and were ignored",n_missing);
            }
            names
        }
        None => {
            match utils::get_all_matches(&args.src_dir,"*") {
                Some(paths) => paths.iter()
                    .filter(|p| p.is_file())
                    .flat_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
                    .collect(),
                None => Vec::new()
            }
        }
    }
}
