use std::path::{Path, PathBuf};
use std::process::Command;
use bids::layout::{BidsLayout, Subject};
use crate::args::{PrepRunArgs, ReconAllArgs};
use crate::settings::ContainerSettings;

#[derive(Clone,Debug)]
pub enum ContainerError {
    MissingInput(PathBuf),
    LaunchFailed(String),
    CommandFailed{tool:String,code:Option<i32>},
    MissingOutput(PathBuf),
}

fn check_input(path:&Path) -> Result<(),ContainerError> {
    match path.exists() {
        true => Ok(()),
        false => Err(ContainerError::MissingInput(path.to_owned()))
    }
}

fn run(mut cmd:Command,tool:&str) -> Result<(),ContainerError> {
    println!("{:?}",cmd);
    let proc = cmd.spawn().map_err(|_| ContainerError::LaunchFailed(tool.to_string()))?;
    let result = proc.wait_with_output().map_err(|_| ContainerError::LaunchFailed(tool.to_string()))?;
    match result.status.success() {
        true => Ok(()),
        false => Err(ContainerError::CommandFailed{tool:tool.to_string(),code:result.status.code()})
    }
}

/// singularity invocation shared by every suite: clean environment plus the
/// configured binds and whatever the caller needs mounted
fn singularity_run(settings:&ContainerSettings,image:&Path,binds:&[&Path]) -> Command {
    let mut cmd = Command::new(&settings.singularity_binary);
    cmd.arg("run").arg("--cleanenv");
    for bind in binds {
        cmd.arg("-B").arg(utils::absolute_path(bind));
    }
    for bind in &settings.bind_paths {
        cmd.arg("-B").arg(utils::absolute_path(bind));
    }
    cmd.arg(image);
    cmd
}

fn check_subject_inputs(args:&PrepRunArgs) -> Result<Subject,ContainerError> {
    let subject = Subject::new(&args.subject);
    check_input(&args.bids_root)?;
    let layout = BidsLayout::new(&args.bids_root);
    check_input(&layout.subject_dir(&subject))?;
    Ok(subject)
}

pub fn fmriprep(settings:&ContainerSettings,args:&PrepRunArgs) -> Result<(),ContainerError> {
    check_input(&settings.fmriprep_image)?;
    check_input(&settings.freesurfer_license)?;
    let subject = check_subject_inputs(args)?;

    if !args.output_dir.exists() {
        std::fs::create_dir_all(&args.output_dir).map_err(|_| ContainerError::MissingInput(args.output_dir.clone()))?;
    }

    let mut binds:Vec<&Path> = vec![&args.bids_root,&args.output_dir,&settings.freesurfer_license];
    if let Some(work) = &args.work_dir {
        binds.push(work);
    }
    let mut cmd = singularity_run(settings,&settings.fmriprep_image,&binds);
    cmd.arg(&args.bids_root)
        .arg(&args.output_dir)
        .arg("participant")
        .arg("--participant-label").arg(subject.label())
        .arg("--fs-license-file").arg(&settings.freesurfer_license)
        .arg("--nthreads").arg(args.nthreads.unwrap_or(settings.nthreads).to_string())
        .arg("--mem-mb").arg(args.mem_mb.unwrap_or(settings.mem_mb).to_string());
    if let Some(work) = &args.work_dir {
        cmd.arg("-w").arg(work);
    }
    run(cmd,"fmriprep")?;

    // the suite writes a per-subject visual report at the top of its tree
    let report = args.output_dir.join("fmriprep").join(format!("{}.html",subject.id()));
    match report.exists() {
        true => Ok(()),
        false => Err(ContainerError::MissingOutput(report))
    }
}

pub fn qsiprep(settings:&ContainerSettings,args:&PrepRunArgs) -> Result<(),ContainerError> {
    check_input(&settings.qsiprep_image)?;
    check_input(&settings.freesurfer_license)?;
    let subject = check_subject_inputs(args)?;

    if !args.output_dir.exists() {
        std::fs::create_dir_all(&args.output_dir).map_err(|_| ContainerError::MissingInput(args.output_dir.clone()))?;
    }

    let mut binds:Vec<&Path> = vec![&args.bids_root,&args.output_dir,&settings.freesurfer_license];
    if let Some(work) = &args.work_dir {
        binds.push(work);
    }
    let mut cmd = singularity_run(settings,&settings.qsiprep_image,&binds);
    cmd.arg(&args.bids_root)
        .arg(&args.output_dir)
        .arg("participant")
        .arg("--participant-label").arg(subject.label())
        .arg("--fs-license-file").arg(&settings.freesurfer_license)
        .arg("--nthreads").arg(args.nthreads.unwrap_or(settings.nthreads).to_string())
        .arg("--mem-mb").arg(args.mem_mb.unwrap_or(settings.mem_mb).to_string());
    if let Some(work) = &args.work_dir {
        cmd.arg("-w").arg(work);
    }
    run(cmd,"qsiprep")?;

    let subject_derivatives = args.output_dir.join("qsiprep").join(subject.id());
    match subject_derivatives.exists() {
        true => Ok(()),
        false => Err(ContainerError::MissingOutput(subject_derivatives))
    }
}

pub fn recon_all(settings:&ContainerSettings,args:&ReconAllArgs) -> Result<(),ContainerError> {
    check_input(&settings.freesurfer_image)?;
    check_input(&settings.freesurfer_license)?;
    check_input(&args.t1)?;
    if !args.subjects_dir.exists() {
        std::fs::create_dir_all(&args.subjects_dir).map_err(|_| ContainerError::MissingInput(args.subjects_dir.clone()))?;
    }

    let binds:Vec<&Path> = vec![&args.subjects_dir,&args.t1,&settings.freesurfer_license];
    let mut cmd = singularity_run(settings,&settings.freesurfer_image,&binds);
    cmd.env("FS_LICENSE",utils::absolute_path(&settings.freesurfer_license));
    cmd.arg("recon-all")
        .arg("-all")
        .arg("-subjid").arg(&args.subject)
        .arg("-i").arg(&args.t1)
        .arg("-sd").arg(&args.subjects_dir);
    run(cmd,"recon-all")?;

    // recon-all drops a completion stamp when the full stream finishes
    let stamp = args.subjects_dir.join(&args.subject).join("scripts").join("recon-all.done");
    match stamp.exists() {
        true => Ok(()),
        false => Err(ContainerError::MissingOutput(stamp))
    }
}

#[test]
fn missing_image_fails_before_launch(){
    use crate::settings::Config;
    let mut settings = ContainerSettings::default();
    settings.fmriprep_image = std::env::temp_dir().join("no_such_image.sif");
    let args = PrepRunArgs {
        settings: PathBuf::from("unused"),
        bids_root: std::env::temp_dir(),
        output_dir: std::env::temp_dir().join("container_out"),
        subject: String::from("sub-01"),
        work_dir: None,
        nthreads: None,
        mem_mb: None,
    };
    match fmriprep(&settings,&args) {
        Err(ContainerError::MissingInput(p)) => assert_eq!(p,settings.fmriprep_image),
        other => panic!("expected missing input, got {:?}",other)
    }
}
