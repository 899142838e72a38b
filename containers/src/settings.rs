use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use toml;

/// site-wide container configuration. Image paths point at .sif files built
/// from the upstream docker releases.
#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct ContainerSettings {
    pub singularity_binary:PathBuf,
    pub fmriprep_image:PathBuf,
    pub qsiprep_image:PathBuf,
    pub freesurfer_image:PathBuf,
    pub freesurfer_license:PathBuf,
    /// extra host directories bound into every container
    pub bind_paths:Vec<PathBuf>,
    pub nthreads:u32,
    pub mem_mb:u32,
}

impl Config for ContainerSettings {
    fn default() -> Self {
        Self {
            singularity_binary: PathBuf::from("singularity"),
            fmriprep_image: PathBuf::from("/opt/containers/fmriprep.sif"),
            qsiprep_image: PathBuf::from("/opt/containers/qsiprep.sif"),
            freesurfer_image: PathBuf::from("/opt/containers/freesurfer.sif"),
            freesurfer_license: PathBuf::from("/opt/freesurfer/license.txt"),
            bind_paths: Vec::new(),
            nthreads: 8,
            mem_mb: 16000,
        }
    }
}

impl ConfigFile for ContainerSettings {

    fn to_file(&self, filename: &Path) {
        let t = toml::to_string_pretty(&self).unwrap();
        utils::write_to_file(filename,&Self::file_ext(),&t);
    }

    fn from_file(filename: &Path) -> Self {
        let t = utils::read_to_string(filename,&Self::file_ext());
        toml::from_str(&t).expect("container settings file is corrupt")
    }

    fn file_ext() -> String {
        String::from("container_settings")
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
fn settings_round_trip(){
    let dir = std::env::temp_dir().join("container_settings_tests");
    std::fs::create_dir_all(&dir).expect("cannot create test dir");
    let f = dir.join("site");
    ContainerSettings::default().to_file(&f);
    let s = ContainerSettings::from_file(&f);
    assert_eq!(s.nthreads,8);
    assert_eq!(s.singularity_binary,PathBuf::from("singularity"));
}
