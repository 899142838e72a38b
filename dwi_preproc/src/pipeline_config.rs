use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use toml;
use bids::layout::Subject;

#[derive(Clone,Debug,Serialize,Deserialize)]
pub enum EddyBinary {
    Eddy,
    EddyOpenmp,
}

impl EddyBinary {
    pub fn print(&self) -> String {
        match &self {
            EddyBinary::Eddy => String::from("eddy"),
            EddyBinary::EddyOpenmp => String::from("eddy_openmp")
        }
    }
}

impl Config for EddyBinary {
    fn default() -> Self {
        EddyBinary::EddyOpenmp
    }
}

#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct FslSettings {
    pub topup_config:String,
    pub eddy_binary:EddyBinary,
    pub bet_fractional_intensity:f32,
    pub b0_threshold:f32,
    pub n_b0_volumes:usize,
    pub tbss_fa_threshold:f32,
}

impl Config for FslSettings {
    fn default() -> Self {
        Self {
            topup_config: String::from("b02b0.cnf"),
            eddy_binary: EddyBinary::default(),
            bet_fractional_intensity: 0.2,
            b0_threshold: 50.0,
            n_b0_volumes: 3,
            tbss_fa_threshold: 0.2,
        }
    }
}

#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct SchedulerSettings {
    pub partition:String,
    pub memory:String,
}

impl Config for SchedulerSettings {
    fn default() -> Self {
        Self {
            partition: String::from(""),
            memory: String::from("16G"),
        }
    }
}

#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct ProjectSettings {
    pub project_code:String,
    /// phase-encoding direction label of the main diffusion series
    pub dwi_direction:String,
    /// phase-encoding direction label of the reverse field map epi
    pub fmap_direction:String,
    /// when set, the gathered series must carry exactly this many volumes
    pub expected_dwi_vols:Option<usize>,
    pub fsl_settings:FslSettings,
    pub scheduler_settings:SchedulerSettings,
}

impl Config for ProjectSettings {
    fn default() -> Self {
        Self {
            project_code: String::from("project.01"),
            dwi_direction: String::from("PA"),
            fmap_direction: String::from("AP"),
            expected_dwi_vols: None,
            fsl_settings: FslSettings::default(),
            scheduler_settings: SchedulerSettings::default(),
        }
    }
}

impl ConfigFile for ProjectSettings {

    fn to_file(&self, filename: &Path) {
        let t = toml::to_string_pretty(&self).unwrap();
        utils::write_to_file(&filename,&Self::file_ext(),&t);
    }
    fn from_file(filename: &Path) -> Self {
        let t = utils::read_to_string(filename,&Self::file_ext());
        toml::from_str(&t).expect("project settings must be corrupt")
    }
    fn file_ext() -> String {
        String::from("project_settings")
    }

}

impl ProjectSettings {
    pub fn to_txt(&self) -> String {
        toml::to_string_pretty(&self).unwrap()
    }
}

#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct RunSettings {
    pub run_number:String,
    pub operator_id:String,
}

#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct SubjectSettings {
    pub subject:Subject,
    pub bids_root:PathBuf,
    pub derivatives_dir:PathBuf,
    pub work_dir:PathBuf,
}

impl SubjectSettings {
    pub fn new_batch_settings(bids_root:&Path,work_base:&Path,subjects:&[Subject]) -> Vec<Self> {
        subjects.iter().map(|subject|
            Self {
                subject: subject.clone(),
                bids_root: bids_root.to_owned(),
                derivatives_dir: bids_root.join("derivatives"),
                work_dir: work_base.join(subject.id()),
            }
        ).collect()
    }
}

#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct SubjectManagerConfig {
    pub slurm_disabled:bool,
    pub run_settings:RunSettings,
    pub project_settings:ProjectSettings,
    pub subject_settings:SubjectSettings,
}

impl ConfigFile for SubjectManagerConfig {

    fn to_file(&self, filename: &Path) {
        let t = toml::to_string_pretty(&self).unwrap();
        utils::write_to_file(filename,&Self::file_ext(),&t);
    }

    fn from_file(filename: &Path) -> Self {
        let t = utils::read_to_string(filename,&Self::file_ext());
        toml::from_str(&t).expect("subject manager config file is corrupt")
    }

    fn file_ext() -> String {
        String::from("subject_config")
    }

}

impl SubjectManagerConfig {
    pub fn new_batch_config(project_settings:&Path,operator_id:&str,run_number:&str,bids_root:&Path,work_base:&Path,subjects:&[Subject],slurm_disabled:bool) -> Vec<Self> {
        let p = ProjectSettings::from_file(project_settings);
        let r = RunSettings {
            run_number: run_number.to_string(),
            operator_id: operator_id.to_string(),
        };
        let subject_settings = SubjectSettings::new_batch_settings(bids_root,work_base,subjects);
        subject_settings.iter().map(|s| SubjectManagerConfig{
            project_settings:p.clone(),
            subject_settings:s.clone(),
            run_settings:r.clone(),
            slurm_disabled
        }).collect()
    }

    pub fn name(&self) -> String {
        format!("{}_{}",self.run_settings.run_number,self.subject_settings.subject.id())
    }

    pub fn subject(&self) -> &Subject {
        &self.subject_settings.subject
    }

    pub fn exists(filename:&Path) -> bool {
        filename.with_extension(Self::file_ext()).exists()
    }

    pub fn is_slurm_disabled(&self) -> bool{
        self.slurm_disabled
    }
}


pub trait Config {
    fn default() -> Self;
}

pub trait ConfigFile {
    fn to_file(&self, filename:&Path);
    fn from_file(filename:&Path) -> Self;
    fn file_ext() -> String;
}

#[test]
fn project_settings_round_trip(){
    let dir = std::env::temp_dir().join("pipeline_config_tests");
    std::fs::create_dir_all(&dir).expect("cannot create test dir");
    let f = dir.join("project");
    let d = ProjectSettings::default();
    d.to_file(&f);
    let y = ProjectSettings::from_file(&f);
    assert_eq!(y.dwi_direction,"PA");
    assert_eq!(y.fsl_settings.n_b0_volumes,3);
}

#[test]
fn batch_config_one_per_subject(){
    let dir = std::env::temp_dir().join("pipeline_config_tests");
    std::fs::create_dir_all(&dir).expect("cannot create test dir");
    let f = dir.join("batch_project");
    ProjectSettings::default().to_file(&f);
    let subjects:Vec<Subject> = ["sub-01","sub-02","sub-03"].iter().map(|s| Subject::new(s)).collect();
    let configs = SubjectManagerConfig::new_batch_config(
        &f,"op1","R0001",Path::new("/data/bids"),Path::new("/scratch/R0001.work"),&subjects,false);
    assert_eq!(configs.len(),3);
    assert_eq!(configs[0].name(),"R0001_sub-01");
    assert_eq!(configs[2].subject_settings.work_dir,Path::new("/scratch/R0001.work/sub-03"));
}
