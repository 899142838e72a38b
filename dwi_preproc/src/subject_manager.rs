use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use std::process::Command;
use serde::{Deserialize, Serialize};
use bids::gradient_table::GradientTable;
use bids::layout::BidsLayout;
use bids::sidecar::Sidecar;
use crate::acq_params;
use crate::fsl::{self, nii_gz, EddyInputs};
use crate::pipeline_config::{ConfigFile, SubjectManagerConfig};
use crate::slurm::{self, JobRequest, JobState, SlurmError};

pub const DERIVATIVE_TOOL_NAME:&str = "dwi_preproc";

// resources stays last so the serialized state file keeps plain values
// ahead of the resource table
#[derive(Debug,Serialize,Deserialize)]
pub struct SubjectManager{
    config:PathBuf,
    state:SubjectState,
    n_dwi_vols:Option<usize>,
    n_b0_forward:Option<usize>,
    n_reverse:Option<usize>,
    slurm_job_id:Option<u32>,
    resources:Option<SubjectResources>,
}

#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct SubjectResources {
    pub dwi:PathBuf,
    pub bval:PathBuf,
    pub bvec:PathBuf,
    pub dwi_sidecar:PathBuf,
    pub fmap:PathBuf,
    pub fmap_sidecar:PathBuf,
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub enum ResourceError {
    DwiNotFound,
    BvalNotFound,
    BvecNotFound,
    DwiSidecarNotFound,
    FmapNotFound,
    FmapSidecarNotFound,
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub enum SubjectState {
    Idle,
    GatheringResources,
    ExtractingB0,
    MergingB0Pairs,
    WritingAcqParams,
    RunningTopup,
    MaskingBrain,
    RunningEddy,
    FittingTensor,
    RunningEddyQc,
    Done,
}

#[derive(Clone,Debug,Serialize,Deserialize)]
enum StateAdvance {
    Succeeded,
    TerminalFailure,
    AllWorkDone,
}

impl SubjectResources {

    pub fn gather(settings:&SubjectManagerConfig) -> Result<Self,ResourceError> {
        let layout = BidsLayout::new(&settings.subject_settings.bids_root);
        let subject = settings.subject();
        let dwi_dir = layout.dwi_dir(subject);
        let fmap_dir = layout.fmap_dir(subject);
        let dwi_name = format!("{}_dir-{}_dwi",subject.id(),settings.project_settings.dwi_direction);
        let fmap_name = format!("{}_acq-dwi_dir-{}_epi",subject.id(),settings.project_settings.fmap_direction);

        let dwi = utils::get_first_match(&dwi_dir,&format!("{}.nii*",dwi_name)).ok_or(ResourceError::DwiNotFound)?;
        let bval = utils::get_first_match(&dwi_dir,&format!("{}.bval",dwi_name)).ok_or(ResourceError::BvalNotFound)?;
        let bvec = utils::get_first_match(&dwi_dir,&format!("{}.bvec",dwi_name)).ok_or(ResourceError::BvecNotFound)?;
        let dwi_sidecar = utils::get_first_match(&dwi_dir,&format!("{}.json",dwi_name)).ok_or(ResourceError::DwiSidecarNotFound)?;
        let fmap = utils::get_first_match(&fmap_dir,&format!("{}.nii*",fmap_name)).ok_or(ResourceError::FmapNotFound)?;
        let fmap_sidecar = utils::get_first_match(&fmap_dir,&format!("{}.json",fmap_name)).ok_or(ResourceError::FmapSidecarNotFound)?;

        Ok(Self {
            dwi,
            bval,
            bvec,
            dwi_sidecar,
            fmap,
            fmap_sidecar,
        })
    }
}

/// shape checks on the gathered series. Returns the volume count on success
/// so callers don't have to re-read the header.
pub fn validate_resources(settings:&SubjectManagerConfig,resources:&SubjectResources) -> Result<usize,String> {
    let table = GradientTable::open(&resources.bval).map_err(|e| format!("{:?}",e))?;
    table.check_bvec(&resources.bvec).map_err(|e| format!("{:?}",e))?;
    let n_vols = mr_image::n_volumes(&resources.dwi).map_err(|e| format!("{:?}",e))?;
    table.check_volume_count(n_vols).map_err(|e| format!("{:?}",e))?;
    match settings.project_settings.expected_dwi_vols {
        Some(expected) if expected != n_vols => {
            return Err(format!("{:?} has {} volumes, project expects {}",resources.dwi,n_vols,expected))
        }
        _=> {}
    }
    Ok(n_vols)
}

/// input check without running anything. This is what the preflight
/// subcommand calls per subject.
pub fn check_resources(settings:&SubjectManagerConfig) -> Result<(),String> {
    let resources = SubjectResources::gather(settings).map_err(|e| format!("{:?}",e))?;
    validate_resources(settings,&resources)?;
    Ok(())
}

impl SubjectManager {

    pub fn read(config:&Path) -> Option<Self> {
        let state_file = config.with_extension(Self::file_ext());
        match state_file.exists() {
            false => None,
            true => {
                let t = utils::read_to_string(config,&Self::file_ext());
                Some(toml::from_str(&t).expect("subject manager state file is corrupt. What happened?"))
            }
        }
    }

    pub fn open(config:&Path) -> Self {
        match Self::read(config) {
            Some(vm) => vm,
            None => {
                println!("state file not found. creating a new one ...");
                Self::new(config)
            }
        }
    }

    pub fn config(&self) -> SubjectManagerConfig {
        SubjectManagerConfig::from_file(&self.config)
    }

    pub fn to_file(&self) {
        let t = toml::to_string(&self).unwrap();
        utils::write_to_file(&self.config,&Self::file_ext(),&t);
    }

    fn file_ext() -> String {
        String::from("subject_manager")
    }

    fn new(config:&Path) -> Self {
        Self {
            config: config.to_owned(),
            state: SubjectState::Idle,
            resources: None,
            n_dwi_vols: None,
            n_b0_forward: None,
            n_reverse: None,
            slurm_job_id: None,
        }
    }

    pub fn name(&self) -> String {
        self.config().name()
    }

    pub fn work_dir(&self) -> &Path {
        self.config.parent().expect(&format!("subject manager config has no parent {:?}",self.config))
    }

    pub fn state_string(&self) -> String {
        format!("{:?}",self.state)
    }

    pub fn is_done(&self) -> bool {
        match self.state {
            SubjectState::Done => true,
            _=> false
        }
    }

    pub fn job_id(&self) -> Option<u32> {
        self.slurm_job_id.clone()
    }

    pub fn slurm_status(&self) -> Option<JobState> {
        match self.slurm_job_id {
            Some(jid) => Some(slurm::query_state(jid,60)),
            None => None
        }
    }

    pub fn slurm_out_dir(&self) -> PathBuf {
        self.work_dir().join("slurm_out")
    }

    fn b0_base(&self) -> PathBuf {
        self.work_dir().join(format!("{}_b0",self.name()))
    }

    fn b0_pair_base(&self) -> PathBuf {
        self.work_dir().join(format!("{}_b0pair",self.name()))
    }

    fn acq_params_file(&self) -> PathBuf {
        self.work_dir().join(format!("{}_acqparams",self.name())).with_extension("txt")
    }

    fn index_file(&self) -> PathBuf {
        self.work_dir().join(format!("{}_index",self.name())).with_extension("txt")
    }

    fn topup_base(&self) -> PathBuf {
        self.work_dir().join(format!("{}_topup",self.name()))
    }

    fn field_base(&self) -> PathBuf {
        self.work_dir().join(format!("{}_fieldmap",self.name()))
    }

    fn unwarped_base(&self) -> PathBuf {
        self.work_dir().join(format!("{}_b0_unwarped",self.name()))
    }

    fn b0_mean_base(&self) -> PathBuf {
        self.work_dir().join(format!("{}_b0_mean",self.name()))
    }

    fn brain_base(&self) -> PathBuf {
        self.work_dir().join(format!("{}_brain",self.name()))
    }

    fn brain_mask(&self) -> PathBuf {
        nii_gz(&self.work_dir().join(format!("{}_brain_mask",self.name())))
    }

    fn eddy_base(&self) -> PathBuf {
        self.work_dir().join(format!("{}_eddy",self.name()))
    }

    fn derivative_dir(&self,settings:&SubjectManagerConfig) -> PathBuf {
        settings.subject_settings.derivatives_dir
            .join(DERIVATIVE_TOOL_NAME)
            .join(settings.subject().id())
    }

    fn dti_base(&self,settings:&SubjectManagerConfig) -> PathBuf {
        self.derivative_dir(settings).join(format!("{}_dti",settings.subject().id()))
    }

    fn launch_cmd(config:&Path) -> Command {
        let this_exe = std::env::current_exe().expect("couldn't determine the current executable");
        let mut cmd = Command::new(this_exe);
        cmd.args(
            vec![
                "subject-manager",
                "launch",
                config.to_str().unwrap()
            ]
        );
        cmd
    }

    pub fn slurm_job_request(config:&Path) -> JobRequest {
        let vm = SubjectManager::open(config);
        let settings = vm.config();
        let mut job = JobRequest::new(
            &settings.run_settings.run_number,
            &settings.subject().id(),
            &[Self::launch_cmd(config)]);
        job.partition = settings.project_settings.scheduler_settings.partition.clone();
        job.memory = settings.project_settings.scheduler_settings.memory.clone();
        let out_dir = vm.slurm_out_dir();
        if !out_dir.exists(){
            create_dir_all(&out_dir).expect(&format!("unable to create {:?}",out_dir));
        }
        job.output = Some(out_dir.join("slurm-%j").with_extension("out"));
        job
    }

    pub fn launch_with_slurm_now(config:&Path) -> Result<u32,SlurmError> {
        let mut vm = SubjectManager::open(config);
        let job = Self::slurm_job_request(config);
        let jid = job.submit(vm.work_dir())?;
        vm.slurm_job_id = Some(jid);
        vm.to_file();
        Ok(jid)
    }

    /// drive the pipeline for one subject to completion or to its first
    /// terminal failure. Returns true when all work is done so batch callers
    /// can account without unwinding.
    pub fn launch(config:&Path) -> bool {

        let mut vm = SubjectManager::open(config);

        println!("loaded subject manager state: {}",vm.state_string());

        use StateAdvance::*;

        loop {
            let status = vm.advance_state();
            println!("current state is {:?}",vm.state);
            vm.to_file();
            match status {
                Succeeded => continue,
                TerminalFailure => {
                    eprintln!("ERROR: {} cannot continue from state {:?}",vm.name(),vm.state);
                    return false
                },
                AllWorkDone => {
                    println!("all work is complete for {}",vm.name());
                    return true
                }
            }
        }
    }

    fn advance_state(&mut self) -> StateAdvance {

        let settings = self.config();

        use SubjectState::*;
        match &self.state {
            Idle | GatheringResources => {
                println!("gathering and checking resources ...");
                match SubjectResources::gather(&settings) {
                    Ok(resources) => {
                        match validate_resources(&settings,&resources) {
                            Ok(n_vols) => {
                                println!("found {} volume series for {}",n_vols,settings.subject().id());
                                self.resources = Some(resources);
                                self.n_dwi_vols = Some(n_vols);
                                self.state = ExtractingB0;
                                StateAdvance::Succeeded
                            }
                            Err(e) => {
                                eprintln!("ERROR: input shape check failed: {}",e);
                                StateAdvance::TerminalFailure
                            }
                        }
                    },
                    Err(e) => {
                        eprintln!("ERROR: missing input: {:?}",e);
                        self.state = GatheringResources;
                        StateAdvance::TerminalFailure
                    }
                }
            }
            ExtractingB0 => {
                println!("extracting b0 volumes ...");
                let res = match &self.resources {
                    Some(res) => res.clone(),
                    None => {
                        eprintln!("ERROR: resources not available");
                        return StateAdvance::TerminalFailure
                    }
                };
                let fsl_settings = &settings.project_settings.fsl_settings;
                let table = match GradientTable::open(&res.bval) {
                    Ok(t) => t,
                    Err(e) => {
                        eprintln!("ERROR: {:?}",e);
                        return StateAdvance::TerminalFailure
                    }
                };
                let indices = match acq_params::select_b0_indices(&table,fsl_settings.b0_threshold,fsl_settings.n_b0_volumes) {
                    Ok(indices) => indices,
                    Err(e) => {
                        eprintln!("ERROR: b0 selection failed: {:?}",e);
                        return StateAdvance::TerminalFailure
                    }
                };
                match fsl::select_vols(&res.dwi,&self.b0_base(),&indices) {
                    Ok(()) => {}
                    Err(e) => {
                        eprintln!("ERROR: {:?}",e);
                        return StateAdvance::TerminalFailure
                    }
                }
                match mr_image::expect_n_volumes(&nii_gz(&self.b0_base()),indices.len()) {
                    Ok(()) => {
                        self.n_b0_forward = Some(indices.len());
                        self.state = MergingB0Pairs;
                        StateAdvance::Succeeded
                    }
                    Err(e) => {
                        eprintln!("ERROR: b0 extraction postcondition failed: {}",e);
                        StateAdvance::TerminalFailure
                    }
                }
            }
            MergingB0Pairs => {
                println!("merging forward and reverse b0 volumes ...");
                let res = self.resources.clone().expect("resources must be gathered before merging");
                let n_forward = self.n_b0_forward.expect("b0 extraction must run before merging");
                let n_reverse = match mr_image::n_volumes(&res.fmap) {
                    Ok(n) => n,
                    Err(e) => {
                        eprintln!("ERROR: {:?}",e);
                        return StateAdvance::TerminalFailure
                    }
                };
                match fsl::merge_time_series(&self.b0_pair_base(),&[nii_gz(&self.b0_base()),res.fmap.clone()]) {
                    Ok(()) => {}
                    Err(e) => {
                        eprintln!("ERROR: {:?}",e);
                        return StateAdvance::TerminalFailure
                    }
                }
                match mr_image::expect_n_volumes(&nii_gz(&self.b0_pair_base()),n_forward+n_reverse) {
                    Ok(()) => {
                        self.n_reverse = Some(n_reverse);
                        self.state = WritingAcqParams;
                        StateAdvance::Succeeded
                    }
                    Err(e) => {
                        eprintln!("ERROR: b0 merge postcondition failed: {}",e);
                        StateAdvance::TerminalFailure
                    }
                }
            }
            WritingAcqParams => {
                println!("writing acqparams and index files ...");
                let res = self.resources.clone().expect("resources must be gathered before writing acqparams");
                let n_forward = self.n_b0_forward.expect("b0 extraction must run before writing acqparams");
                let n_reverse = self.n_reverse.expect("b0 merge must run before writing acqparams");
                let n_vols = self.n_dwi_vols.expect("volume count must be known before writing acqparams");

                let forward_meta = Sidecar::from_file(&res.dwi_sidecar)
                    .and_then(|s| Ok((s.phase_encoding()?,s.total_readout_time()?)));
                let reverse_meta = Sidecar::from_file(&res.fmap_sidecar)
                    .and_then(|s| Ok((s.phase_encoding()?,s.total_readout_time()?)));

                match (forward_meta,reverse_meta) {
                    (Ok((fwd_pe,fwd_readout)),Ok((rev_pe,rev_readout))) => {
                        if rev_pe != fwd_pe.reversed() {
                            println!("WARN: field map encoding {:?} is not the reverse of the series encoding {:?}",rev_pe,fwd_pe);
                        }
                        acq_params::write_acq_params(
                            &self.acq_params_file(),
                            fwd_pe,fwd_readout,n_forward,
                            rev_pe,rev_readout,n_reverse);
                        acq_params::write_eddy_index(&self.index_file(),n_vols);
                        self.state = RunningTopup;
                        StateAdvance::Succeeded
                    }
                    (fwd,rev) => {
                        if let Err(e) = fwd { eprintln!("ERROR: series sidecar: {:?}",e) }
                        if let Err(e) = rev { eprintln!("ERROR: field map sidecar: {:?}",e) }
                        StateAdvance::TerminalFailure
                    }
                }
            }
            RunningTopup => {
                println!("estimating susceptibility distortion with topup ...");
                match fsl::topup(
                    &settings.project_settings.fsl_settings,
                    &nii_gz(&self.b0_pair_base()),
                    &self.acq_params_file(),
                    &self.topup_base(),
                    &self.field_base(),
                    &self.unwarped_base()) {
                    Ok(()) => {
                        self.state = MaskingBrain;
                        StateAdvance::Succeeded
                    }
                    Err(e) => {
                        eprintln!("ERROR: {:?}",e);
                        StateAdvance::TerminalFailure
                    }
                }
            }
            MaskingBrain => {
                println!("computing mean b0 and brain mask ...");
                let result = fsl::t_mean(&nii_gz(&self.unwarped_base()),&self.b0_mean_base())
                    .and_then(|_| fsl::bet(&settings.project_settings.fsl_settings,&nii_gz(&self.b0_mean_base()),&self.brain_base()));
                match result {
                    Ok(_mask) => {
                        self.state = RunningEddy;
                        StateAdvance::Succeeded
                    }
                    Err(e) => {
                        eprintln!("ERROR: {:?}",e);
                        StateAdvance::TerminalFailure
                    }
                }
            }
            RunningEddy => {
                println!("correcting eddy currents and motion ...");
                let res = self.resources.clone().expect("resources must be gathered before eddy");
                let n_vols = self.n_dwi_vols.expect("volume count must be known before eddy");
                let inputs = EddyInputs {
                    imain: &res.dwi,
                    mask: &self.brain_mask(),
                    acq_params: &self.acq_params_file(),
                    index: &self.index_file(),
                    bvecs: &res.bvec,
                    bvals: &res.bval,
                    topup_base: &self.topup_base(),
                    out_base: &self.eddy_base(),
                };
                match fsl::eddy(&settings.project_settings.fsl_settings,&inputs) {
                    Ok(()) => {}
                    Err(e) => {
                        eprintln!("ERROR: {:?}",e);
                        return StateAdvance::TerminalFailure
                    }
                }
                match mr_image::expect_n_volumes(&nii_gz(&self.eddy_base()),n_vols) {
                    Ok(()) => {
                        self.state = FittingTensor;
                        StateAdvance::Succeeded
                    }
                    Err(e) => {
                        eprintln!("ERROR: eddy postcondition failed: {}",e);
                        StateAdvance::TerminalFailure
                    }
                }
            }
            FittingTensor => {
                println!("fitting diffusion tensor ...");
                let res = self.resources.clone().expect("resources must be gathered before dtifit");
                let deriv_dir = self.derivative_dir(&settings);
                if !deriv_dir.exists() {
                    create_dir_all(&deriv_dir).expect(&format!("cannot create {:?}",deriv_dir));
                }
                // eddy writes rotated gradient directions next to its output
                let rotated = self.eddy_base().with_extension("eddy_rotated_bvecs");
                let bvecs = match rotated.exists() {
                    true => rotated,
                    false => res.bvec.clone()
                };
                match fsl::dtifit(
                    &nii_gz(&self.eddy_base()),
                    &self.brain_mask(),
                    &bvecs,
                    &res.bval,
                    &self.dti_base(&settings)) {
                    Ok(fa) => {
                        println!("wrote {:?}",fa);
                        self.state = RunningEddyQc;
                        StateAdvance::Succeeded
                    }
                    Err(e) => {
                        eprintln!("ERROR: {:?}",e);
                        StateAdvance::TerminalFailure
                    }
                }
            }
            RunningEddyQc => {
                println!("running eddy qc ...");
                let res = self.resources.clone().expect("resources must be gathered before eddy qc");
                let qc_dir = self.derivative_dir(&settings).join(format!("{}_eddy_quad",settings.subject().id()));
                // qc is a known-optional step. A failure is logged and the
                // subject still completes.
                match fsl::eddy_quad(
                    &self.eddy_base(),
                    &self.index_file(),
                    &self.acq_params_file(),
                    &self.brain_mask(),
                    &res.bval,
                    &qc_dir) {
                    Ok(()) => {}
                    Err(e) => {
                        println!("WARN: eddy_quad failed ({:?}). continuing without qc report",e);
                    }
                }
                self.state = Done;
                StateAdvance::Succeeded
            }
            Done => {
                println!("all work is complete.");
                StateAdvance::AllWorkDone
            }
        }
    }
}
