use std::path::{Path, PathBuf};
use std::process::Command;
use crate::pipeline_config::FslSettings;

/// external tool failures. These are fatal for the subject being processed
/// but must not take down a batch, so everything here returns a Result.
#[derive(Clone,Debug)]
pub enum FslError {
    LaunchFailed{tool:String},
    CommandFailed{tool:String,code:Option<i32>},
    MissingOutput{tool:String,path:PathBuf},
}

/// fsl writes compressed nifti by default
pub fn nii_gz(base:&Path) -> PathBuf {
    let mut s = base.as_os_str().to_owned();
    s.push(".nii.gz");
    PathBuf::from(s)
}

fn run_tool(mut cmd:Command) -> Result<(),FslError> {
    let tool = cmd.get_program().to_string_lossy().to_string();
    println!("{:?}",cmd);
    let proc = cmd.spawn().map_err(|_| FslError::LaunchFailed{tool:tool.clone()})?;
    let result = proc.wait_with_output().map_err(|_| FslError::LaunchFailed{tool:tool.clone()})?;
    match result.status.success() {
        true => Ok(()),
        false => Err(FslError::CommandFailed{tool,code:result.status.code()})
    }
}

fn check_output(tool:&str,path:&Path) -> Result<(),FslError> {
    match path.exists() {
        true => Ok(()),
        false => Err(FslError::MissingOutput{tool:tool.to_string(),path:path.to_owned()})
    }
}

/// pull a subset of volumes out of a 4d series by index
pub fn select_vols(input:&Path,output_base:&Path,indices:&[usize]) -> Result<(),FslError> {
    let list:Vec<String> = indices.iter().map(|i| i.to_string()).collect();
    let mut cmd = Command::new("fslselectvols");
    cmd.arg("-i").arg(input)
        .arg("-o").arg(output_base)
        .arg(format!("--vols={}",list.join(",")));
    run_tool(cmd)?;
    check_output("fslselectvols",&nii_gz(output_base))
}

/// concatenate along time
pub fn merge_time_series(output_base:&Path,inputs:&[PathBuf]) -> Result<(),FslError> {
    let mut cmd = Command::new("fslmerge");
    cmd.arg("-t").arg(output_base);
    for input in inputs {
        cmd.arg(input);
    }
    run_tool(cmd)?;
    check_output("fslmerge",&nii_gz(output_base))
}

pub fn t_mean(input:&Path,output_base:&Path) -> Result<(),FslError> {
    let mut cmd = Command::new("fslmaths");
    cmd.arg(input).arg("-Tmean").arg(output_base);
    run_tool(cmd)?;
    check_output("fslmaths",&nii_gz(output_base))
}

pub fn topup(settings:&FslSettings,imain:&Path,acq_params:&Path,out_base:&Path,field_base:&Path,unwarped_base:&Path) -> Result<(),FslError> {
    let mut cmd = Command::new("topup");
    cmd.arg(format!("--imain={}",imain.to_str().unwrap()))
        .arg(format!("--datain={}",acq_params.to_str().unwrap()))
        .arg(format!("--config={}",settings.topup_config))
        .arg(format!("--out={}",out_base.to_str().unwrap()))
        .arg(format!("--fout={}",field_base.to_str().unwrap()))
        .arg(format!("--iout={}",unwarped_base.to_str().unwrap()));
    run_tool(cmd)?;
    check_output("topup",&nii_gz(unwarped_base))
}

/// brain extraction with a binary mask. The mask lands at <out>_mask.nii.gz
pub fn bet(settings:&FslSettings,input:&Path,output_base:&Path) -> Result<PathBuf,FslError> {
    let mut cmd = Command::new("bet");
    cmd.arg(input).arg(output_base)
        .arg("-f").arg(settings.bet_fractional_intensity.to_string())
        .arg("-m");
    run_tool(cmd)?;
    let mask_base = PathBuf::from(format!("{}_mask",output_base.to_str().unwrap()));
    let mask = nii_gz(&mask_base);
    check_output("bet",&mask)?;
    Ok(mask)
}

pub struct EddyInputs<'a> {
    pub imain:&'a Path,
    pub mask:&'a Path,
    pub acq_params:&'a Path,
    pub index:&'a Path,
    pub bvecs:&'a Path,
    pub bvals:&'a Path,
    pub topup_base:&'a Path,
    pub out_base:&'a Path,
}

pub fn eddy(settings:&FslSettings,inputs:&EddyInputs) -> Result<(),FslError> {
    let mut cmd = Command::new(settings.eddy_binary.print());
    cmd.arg(format!("--imain={}",inputs.imain.to_str().unwrap()))
        .arg(format!("--mask={}",inputs.mask.to_str().unwrap()))
        .arg(format!("--acqp={}",inputs.acq_params.to_str().unwrap()))
        .arg(format!("--index={}",inputs.index.to_str().unwrap()))
        .arg(format!("--bvecs={}",inputs.bvecs.to_str().unwrap()))
        .arg(format!("--bvals={}",inputs.bvals.to_str().unwrap()))
        .arg(format!("--topup={}",inputs.topup_base.to_str().unwrap()))
        .arg(format!("--out={}",inputs.out_base.to_str().unwrap()));
    run_tool(cmd)?;
    check_output(&settings.eddy_binary.print(),&nii_gz(inputs.out_base))
}

pub fn dtifit(data:&Path,mask:&Path,bvecs:&Path,bvals:&Path,out_base:&Path) -> Result<PathBuf,FslError> {
    let mut cmd = Command::new("dtifit");
    cmd.arg("-k").arg(data)
        .arg("-m").arg(mask)
        .arg("-r").arg(bvecs)
        .arg("-b").arg(bvals)
        .arg("-o").arg(out_base);
    run_tool(cmd)?;
    let fa_base = PathBuf::from(format!("{}_FA",out_base.to_str().unwrap()));
    let fa = nii_gz(&fa_base);
    check_output("dtifit",&fa)?;
    Ok(fa)
}

/// single-subject eddy qc. Callers treat a failure here as non-fatal.
pub fn eddy_quad(eddy_base:&Path,index:&Path,acq_params:&Path,mask:&Path,bvals:&Path,output_dir:&Path) -> Result<(),FslError> {
    let mut cmd = Command::new("eddy_quad");
    cmd.arg(eddy_base)
        .arg("-idx").arg(index)
        .arg("-par").arg(acq_params)
        .arg("-m").arg(mask)
        .arg("-b").arg(bvals)
        .arg("-o").arg(output_dir);
    run_tool(cmd)
}

#[test]
fn nii_gz_appends_to_base(){
    assert_eq!(nii_gz(Path::new("/work/sub-01_b0")),Path::new("/work/sub-01_b0.nii.gz"));
}

#[test]
fn missing_tool_reports_launch_failure(){
    let cmd = Command::new("no_such_fsl_tool_exists");
    match run_tool(cmd) {
        Err(FslError::LaunchFailed{tool}) => assert_eq!(tool,"no_such_fsl_tool_exists"),
        other => panic!("expected launch failure, got {:?}",other)
    }
}
