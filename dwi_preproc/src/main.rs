use std::fs::{create_dir, create_dir_all};
use std::io::stdin;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use bids::layout::{BidsLayout, Subject};
use dwi_preproc::batch::run_batch;
use dwi_preproc::pipeline_config::{Config, ConfigFile, ProjectSettings, SubjectManagerConfig};
use dwi_preproc::subject_manager::{check_resources, SubjectManager};
use dwi_preproc::{slurm, tbss};

const SCRATCH_ENV:&str = "DWI_SCRATCH";

#[derive(clap::Parser,Debug)]
pub struct PreprocArgs {
    #[command(subcommand)]
    pub action: PreprocAction,
}

#[derive(clap::Subcommand,Debug)]
pub enum PreprocAction {
    /// run the diffusion preprocessing pipeline over a set of subjects
    Preproc(PreprocRun),
    /// check that every subject has complete, consistent inputs without running anything
    Preflight(PreprocRun),
    /// check the status of a run by run number
    Status(RunnoArgs),
    /// cancel jobs associated with a run number
    Cancel(RunnoArgs),
    /// wait for this run to complete before returning
    WaitForCompletion(WaitForCompletionArgs),
    /// create a new project template to modify for a new protocol
    NewProjectTemplate(TemplateConfigArgs),
    /// gather per-subject FA maps into a tbss directory
    CollectFa(CollectFaArgs),
    /// run the tbss stages over a collected FA directory
    Tbss(TbssArgs),
    /// interact with a single subject manager
    SubjectManager(SubjectManagerCmd),
}

#[derive(clap::Args,Debug)]
pub struct SubjectManagerCmd {
    #[command(subcommand)]
    action:SubjectManagerAction,
}

#[derive(Clone,clap::Subcommand,Debug)]
pub enum SubjectManagerAction {
    Launch(SubjectManagerLaunchArgs),
}

#[derive(Clone,clap::Args,Debug)]
pub struct SubjectManagerLaunchArgs {
    /// path to a subject manager configuration file. This path's directory is
    /// the working directory of the subject manager
    config_file:PathBuf
}

#[derive(Clone,clap::Args,Debug)]
pub struct RunnoArgs {
    run_number:String,
}

#[derive(Clone,clap::Args,Debug)]
pub struct WaitForCompletionArgs {
    run_number:String,
    /// time between completion checks in minutes
    #[clap(long)]
    refresh_period:Option<f32>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct PreprocRun {
    /// operator id for the run record
    operator_id:String,
    /// base configuration used to define pipeline parameters
    project_settings:PathBuf,
    /// run number for this set of subjects
    run_number:String,
    /// root of the BIDS tree holding the raw subjects
    bids_root:PathBuf,
    /// text file with one subject id per line. When omitted, every sub-* directory under the BIDS root is used
    #[clap(long)]
    subjects_file:Option<PathBuf>,
    /// run without slurm scheduling. Subjects are processed serially in your terminal
    #[clap(long)]
    disable_slurm:bool,
    /// skip the settings reminder before launching
    #[clap(long,short)]
    batch_mode:bool,
    /// supply an email to get a notification when the run is done
    #[clap(long,short)]
    email:Option<String>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct TemplateConfigArgs {
    /// absolute path to the new config, or just a file name to save to the working directory.
    /// your file extension will not be respected.
    output_config:PathBuf,
}

#[derive(Clone,clap::Args,Debug)]
pub struct CollectFaArgs {
    /// derivatives directory the tensor fits were written under
    derivatives_dir:PathBuf,
    /// directory the FA maps are collected into
    tbss_dir:PathBuf,
    /// text file with one subject id per line. When omitted, every subject with a derivative directory is used
    #[clap(long)]
    subjects_file:Option<PathBuf>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct TbssArgs {
    /// directory holding the collected FA maps
    tbss_dir:PathBuf,
    /// FA skeleton threshold handed to tbss_4_prestats
    #[clap(long)]
    fa_threshold:Option<f32>,
}

fn main() {
    let args = PreprocArgs::parse();
    match args.action {
        PreprocAction::SubjectManager(cmd) => {
            match cmd.action {
                SubjectManagerAction::Launch(launch_cmd) => {
                    match SubjectManager::launch(&launch_cmd.config_file) {
                        true => {}
                        false => std::process::exit(1)
                    }
                }
            }
        }
        PreprocAction::NewProjectTemplate(args) => {
            ProjectSettings::default().to_file(&args.output_config)
        }
        PreprocAction::Preproc(args) => preproc(args),
        PreprocAction::Preflight(args) => preflight(args),
        PreprocAction::Status(args) => status(args),
        PreprocAction::Cancel(args) => cancel(args),
        PreprocAction::WaitForCompletion(args) => wait_for_completion(args),
        PreprocAction::CollectFa(args) => collect_fa(args),
        PreprocAction::Tbss(args) => run_tbss(args),
    }
}

fn scratch_dir() -> PathBuf {
    let scratch = std::env::var(SCRATCH_ENV).expect(&format!("{} must be set on this workstation",SCRATCH_ENV));
    PathBuf::from(scratch)
}

fn work_dir_for(run_number:&str) -> PathBuf {
    scratch_dir().join(format!("{}.work",run_number))
}

fn subjects_for(args:&PreprocRun) -> Vec<Subject> {
    match &args.subjects_file {
        Some(file) => utils::read_list_file(file).iter().map(|s| Subject::new(s)).collect(),
        None => BidsLayout::new(&args.bids_root).subjects()
    }
}

fn build_configs(args:&PreprocRun,work_dir:&Path) -> Vec<SubjectManagerConfig> {
    let subjects = subjects_for(args);
    if subjects.is_empty() {
        eprintln!("ERROR: no subjects found under {:?}",args.bids_root);
        std::process::exit(1);
    }
    println!("{} subjects will be processed",subjects.len());
    SubjectManagerConfig::new_batch_config(
        &args.project_settings,
        &args.operator_id,
        &args.run_number,
        &args.bids_root,
        work_dir,
        &subjects,
        args.disable_slurm,
    )
}

fn preflight(args:PreprocRun) {
    let work_dir = work_dir_for(&args.run_number);
    let configs = build_configs(&args,&work_dir);
    let summary = run_batch(&configs,|c| c.name(),|c| check_resources(c));
    println!("{}",summary.report());
    if summary.n_failed > 0 {
        std::process::exit(1);
    }
}

fn preproc(args:PreprocRun) {
    let work_dir = work_dir_for(&args.run_number);
    let p = ProjectSettings::from_file(&args.project_settings);

    // remind the user of their settings and confirm with them
    if !args.batch_mode {
        let mut user_in = String::new();
        println!("----------------SETTINGS----------------");
        println!("project_file = '{:?}'",args.project_settings);
        println!("run_number = '{}'",args.run_number);
        println!("{}",p.to_txt());
        println!("----------------------------------------");
        println!("is this configuration correct? Hit enter to continue or control-C to cancel");
        stdin().read_line(&mut user_in).expect("provide an input!");
    }

    let configs = build_configs(&args,&work_dir);

    if !work_dir.exists() {
        create_dir(&work_dir).expect(&format!("unable to create working directory {:?}",work_dir));
    }

    // write fresh subject configs if they don't already exist
    let config_files:Vec<PathBuf> = configs.iter().map(|conf|{
        let config_path = work_dir.join(conf.subject().id());
        create_dir_all(&config_path).expect(&format!("unable to create {:?}",config_path));
        let conf_file = config_path.join(conf.name());
        match SubjectManagerConfig::exists(&conf_file){
            true => {
                println!("config already found for {}. Will not re-initialize",conf.name());
            }
            false => {
                println!("creating new configuration for {}",conf.name());
                conf.to_file(&conf_file);
            }
        }
        conf_file
    }).collect();

    match args.disable_slurm {
        true => {
            let summary = run_batch(&config_files,
                |f| f.file_name().unwrap().to_string_lossy().to_string(),
                |f| match SubjectManager::launch(f) {
                    true => Ok(()),
                    false => Err(String::from("subject pipeline failed"))
                });
            println!("{}",summary.report());
            if summary.n_failed > 0 {
                std::process::exit(1);
            }
        }
        false => {
            for conf_file in &config_files {
                match SubjectManager::launch_with_slurm_now(conf_file) {
                    Ok(jid) => println!("{:?} job submitted with id {}",conf_file.file_name().unwrap(),jid),
                    Err(e) => eprintln!("ERROR: could not submit {:?}: {:?}",conf_file.file_name().unwrap(),e)
                }
            }
            // launch a watcher to send an email when everything is done
            if let Some(email) = &args.email {
                slurm_watch(
                    WaitForCompletionArgs{
                        run_number: args.run_number.clone(),
                        refresh_period: None,
                    },
                    email
                );
                println!("a watcher was launched on your behalf. Check your email {} for notifications",email);
            }
        }
    }
}

fn status(args:RunnoArgs) {
    println!("running status check on {} ...",args.run_number);
    let work_dir = work_dir_for(&args.run_number);

    if !work_dir.exists(){
        println!("{} not found. {:?} doesn't exist.",args.run_number,work_dir);
        return
    }

    // find all subject manager state files recursively
    let state_files = utils::find_files(&work_dir,"subject_manager");

    let mut n_done = 0;
    let mut total = 0;

    match state_files {
        Some(mut files) => {
            files.sort();
            files.iter().for_each(|state_file|{
                let vm = SubjectManager::read(state_file).unwrap();
                let status = vm.state_string();
                match vm.slurm_status() {
                    Some(slurm_state) => {
                        println!("{} state:{}    slurm job status:{:?}",vm.name(),status,slurm_state)
                    }
                    None => {
                        println!("{} state:{}    slurm job status:{}",vm.name(),status,"not scheduled")
                    }
                }
                total += 1;
                if vm.is_done(){
                    n_done += 1;
                }
            });
        }
        None => {
            println!("no subject managers found in {:?}",work_dir);
        }
    }
    println!("{} subject managers have completed of {}",n_done,total);
}

fn cancel(args:RunnoArgs) {
    println!("finding jobs to cancel for {} ...",args.run_number);
    let work_dir = work_dir_for(&args.run_number);

    if !work_dir.exists(){
        println!("{} not found. {:?} doesn't exist.",args.run_number,work_dir);
        return
    }

    let state_files = utils::find_files(&work_dir,"subject_manager");

    let mut states = match state_files {
        None => {
            println!("no subject managers found!");
            return
        }
        Some(state_files) => state_files
    };

    states.sort();

    for s in states {
        let vm = SubjectManager::read(&s).unwrap();
        match vm.job_id() {
            Some(jid) => match slurm::cancel(jid){
                true => println!("{} cancelled",vm.name()),
                false => println!("a problem occurred when attempting to cancel {}",vm.name())
            }
            None => {
                println!("no job id found for {}",vm.name())
            }
        }
    }
}

const DEFAULT_TIME_TO_WAIT:f32 = 2.0; //minutes
fn wait_for_completion(args:WaitForCompletionArgs){
    let work_dir = work_dir_for(&args.run_number);

    if !work_dir.exists(){
        panic!("{} not found. {:?} doesn't exist.",args.run_number,work_dir)
    }

    let mut state_files = utils::find_files(&work_dir,"subject_manager").expect(&format!("no subject managers found in {:?}", work_dir));
    state_files.sort();

    loop {
        let mut n_done = 0;
        let mut total = 0;
        state_files.iter().for_each(|state_file| {
            let vm = SubjectManager::read(state_file).unwrap();
            if vm.is_done() {
                n_done += 1
            }
            total += 1;
        });

        println!("{}: {} of {} are complete",args.run_number,n_done,total);

        match n_done == total {
            true => break,
            false => std::thread::sleep(Duration::from_secs_f32(args.refresh_period.unwrap_or(DEFAULT_TIME_TO_WAIT)*60.0))
        }
    }
}

fn slurm_watch(args:WaitForCompletionArgs,email:&str) {
    let work_dir = work_dir_for(&args.run_number);
    let refresh_period = args.refresh_period.unwrap_or(DEFAULT_TIME_TO_WAIT);

    let this_exe = std::env::current_exe().expect("cannot determine this executable");

    let mut cmd = std::process::Command::new(this_exe);
    cmd.arg("wait-for-completion");
    cmd.arg(&format!("--refresh-period={}",refresh_period));
    cmd.arg(&args.run_number);

    let mut job = slurm::JobRequest::new(&args.run_number,"watcher",&[cmd]);
    job.email = Some(String::from(email));
    job.memory = String::from("20M");
    job.output = Some(work_dir.join("watcher-%j").with_extension("out"));

    match job.submit(&work_dir) {
        Ok(_) => {}
        Err(e) => eprintln!("ERROR: could not submit the watcher job: {:?}",e)
    }
}

fn collect_fa(args:CollectFaArgs) {
    let subjects:Vec<Subject> = match &args.subjects_file {
        Some(file) => utils::read_list_file(file).iter().map(|s| Subject::new(s)).collect(),
        None => {
            let tool_dir = args.derivatives_dir.join(dwi_preproc::subject_manager::DERIVATIVE_TOOL_NAME);
            match utils::get_all_matches(&tool_dir,"sub-*") {
                Some(dirs) => dirs.iter()
                    .filter(|p| p.is_dir())
                    .flat_map(|p| p.file_name().map(|n| Subject::new(n.to_str().unwrap())))
                    .collect(),
                None => Vec::new()
            }
        }
    };
    if subjects.is_empty() {
        eprintln!("ERROR: no subjects to collect FA maps for");
        std::process::exit(1);
    }
    match tbss::collect_fa(&args.derivatives_dir,&args.tbss_dir,&subjects) {
        Ok(n) => println!("collected {} FA maps into {:?}",n,args.tbss_dir),
        Err(e) => {
            eprintln!("ERROR: {}",e);
            std::process::exit(1);
        }
    }
}

fn run_tbss(args:TbssArgs) {
    match tbss::run_tbss(&args.tbss_dir,args.fa_threshold.unwrap_or(0.2)) {
        Ok(()) => println!("tbss stages complete in {:?}",args.tbss_dir),
        Err(e) => {
            eprintln!("ERROR: {:?}",e);
            std::process::exit(1);
        }
    }
}
